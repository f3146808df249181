use std::fmt::Write;

use eyre::Result;
use tracing::subscriber::set_global_default;
use tracing::{Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

use ansi_term::Colour::{Blue, Cyan, Purple, Red, Yellow};

/// Configure logging telemetry
pub fn init(verbose: bool) -> Result<()> {
    let subscriber = match verbose {
        true => get_subscriber("l2_sync=debug".into()),
        false => get_subscriber("l2_sync=info".into()),
    };
    init_subscriber(subscriber)
}

/// Subscriber Composer
///
/// Builds a subscriber with multiple layers into a [tracing](https://crates.io/crates/tracing) subscriber.
/// `RUST_LOG` takes precedence over `env_filter`.
pub fn get_subscriber(env_filter: String) -> impl Subscriber + Sync + Send {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env_filter));
    Registry::default().with(env_filter).with(AnsiTermLayer)
}

/// Globally registers a subscriber.
/// This will error if a subscriber has already been registered.
pub fn init_subscriber(subscriber: impl Subscriber + Send + Sync) -> Result<()> {
    set_global_default(subscriber).map_err(|_| eyre::eyre!("Failed to set subscriber"))
}

/// Collects an event's message and fields into one line
#[derive(Debug, Default)]
pub struct AnsiVisitor {
    message: String,
    fields: String,
}

impl AnsiVisitor {
    fn push(&mut self, field: &tracing::field::Field, value: impl std::fmt::Display) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value}");
        } else {
            let _ = write!(self.fields, " {}={}", Cyan.paint(field.name()), value);
        }
    }

    /// The formatted line, message first
    pub fn line(&self) -> String {
        format!("{}{}", self.message, self.fields)
    }
}

impl tracing::field::Visit for AnsiVisitor {
    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.push(field, value)
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.push(field, value)
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.push(field, value)
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.push(field, value)
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.push(field, value)
    }

    fn record_error(
        &mut self,
        field: &tracing::field::Field,
        value: &(dyn std::error::Error + 'static),
    ) {
        self.push(field, value)
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.push(field, format_args!("{value:?}"))
    }
}

/// An Ansi Term layer for tracing
#[derive(Debug)]
pub struct AnsiTermLayer;

impl<S> Layer<S> for AnsiTermLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let utc: chrono::DateTime<chrono::Utc> = chrono::Utc::now();
        let level = match *event.metadata().level() {
            Level::ERROR => Red.paint("ERROR").to_string(),
            Level::WARN => Yellow.paint("WARN").to_string(),
            Level::INFO => Blue.paint("INFO").to_string(),
            Level::DEBUG => "DEBUG".to_string(),
            Level::TRACE => Purple.paint("TRACE").to_string(),
        };

        let mut visitor = AnsiVisitor::default();
        event.record(&mut visitor);

        let line = format!(
            "[{}] {}: {} {}",
            Cyan.paint(utc.to_rfc2822()),
            level,
            Purple.paint(event.metadata().target()),
            visitor.line()
        );

        match *event.metadata().level() {
            Level::ERROR => eprintln!("{line}"),
            _ => println!("{line}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use tracing::subscriber::with_default;

    use super::get_subscriber;

    #[test]
    fn test_subscriber_accepts_structured_events() {
        let subscriber = get_subscriber("l2_sync=debug".into());
        with_default(subscriber, || {
            tracing::info!(target: "l2_sync", height = 7u64, kind = %"Timeout", "retrying");
            tracing::error!(target: "l2_sync", "faulted");
        });
    }
}
