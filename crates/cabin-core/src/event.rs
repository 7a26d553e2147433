//! Outbound events delivered to the UI surface

use serde_json::Value;

/// Logical delivery channel of an event
///
/// Ordering is only guaranteed within one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventChannel {
    Obd,
    DownloadProgress,
}

/// An asynchronous, fire-and-forget event for the UI surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// One framed line from the OBD stream
    ObdData(String),
    /// Download progress, 0-100
    DownloadProgress(u8),
}

impl BridgeEvent {
    pub fn channel(&self) -> EventChannel {
        match self {
            BridgeEvent::ObdData(_) => EventChannel::Obd,
            BridgeEvent::DownloadProgress(_) => EventChannel::DownloadProgress,
        }
    }

    /// Name of the global callback this event invokes
    pub fn callback_name(&self) -> &'static str {
        match self {
            BridgeEvent::ObdData(_) => "onOBDData",
            BridgeEvent::DownloadProgress(_) => "onDownloadProgress",
        }
    }

    /// Render the event as a guarded callback invocation
    ///
    /// String payloads are JSON-escaped, so the result is safe to evaluate
    /// no matter what bytes the device sent.
    pub fn to_script(&self) -> String {
        let argument = match self {
            BridgeEvent::ObdData(line) => Value::String(line.clone()).to_string(),
            BridgeEvent::DownloadProgress(percent) => percent.to_string(),
        };
        let name = self.callback_name();
        format!("if(window.{name}) window.{name}({argument});")
    }
}

/// Anything that accepts events for later delivery to the UI surface
///
/// Posting never blocks and never fails from the producer's point of view.
pub trait EventSink: Send + Sync {
    fn post(&self, event: BridgeEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obd_script_escapes_payload() {
        let event = BridgeEvent::ObdData("41 0D \"3C\"\\".to_string());
        assert_eq!(
            event.to_script(),
            r#"if(window.onOBDData) window.onOBDData("41 0D \"3C\"\\");"#
        );
    }

    #[test]
    fn test_progress_script() {
        let event = BridgeEvent::DownloadProgress(25);
        assert_eq!(
            event.to_script(),
            "if(window.onDownloadProgress) window.onDownloadProgress(25);"
        );
        assert_eq!(event.channel(), EventChannel::DownloadProgress);
    }

    #[test]
    fn test_control_characters_escaped() {
        let event = BridgeEvent::ObdData("a\u{0007}b</script>".to_string());
        let script = event.to_script();
        assert!(script.contains("\\u0007"));
        assert!(!script.contains('\u{0007}'));
    }
}
