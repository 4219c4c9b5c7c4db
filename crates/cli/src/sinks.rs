use async_trait::async_trait;
use colored::Colorize;
use processor::{DisplayKey, ProcessorResult, Sink};

/// Sink that prints every record to stdout as `topic  key => value`
#[derive(Debug, Clone, Default)]
pub struct ConsoleSink {
    quiet: bool,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept records without printing them
    pub fn quiet() -> Self {
        Self { quiet: true }
    }

    /// Render one record the way it is printed
    pub fn format(topic: &str, key: Option<&[u8]>, value: &[u8]) -> String {
        format!(
            "{}  {} => {}",
            topic.cyan(),
            DisplayKey(key).to_string().yellow(),
            String::from_utf8_lossy(value)
        )
    }
}

#[async_trait]
impl Sink for ConsoleSink {
    async fn send(&self, topic: &str, key: Option<&[u8]>, value: &[u8]) -> ProcessorResult<()> {
        if !self.quiet {
            println!("{}", Self::format(topic, key, value));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_format_and_send() {
        colored::control::set_override(false);
        assert_eq!(
            ConsoleSink::format("city.transaction.stats", Some(&b"Pune"[..]), b"{\"orderCount\":1}"),
            "city.transaction.stats  Pune => {\"orderCount\":1}"
        );

        assert!(ConsoleSink::quiet().send("t", None, b"x").await.is_ok());
    }
}
