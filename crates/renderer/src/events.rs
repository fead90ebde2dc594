use crossbeam_channel::{unbounded, Receiver, Sender};

/// Message shown to the user when the GPU cannot compile shaders at runtime.
pub const SHADER_COMPILER_UNSUPPORTED_MESSAGE: &str =
    "Your device does not support runtime shader compilation.";

/// Notifications the render loop emits for the host to surface.
///
/// The render thread never talks to the user directly. It pushes events into a
/// channel and the host decides whether to show a dialog, print to stderr, or
/// retitle a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    /// The device lacks runtime shader compilation; rendering is disabled
    /// for the session. Emitted at most once.
    ShaderCompilerUnsupported,
    /// Compiling or linking the bundled shaders failed; rendering is
    /// disabled for the session.
    ShaderBuildFailed { log: String },
    /// The presentation surface failed in a way that cannot be retried.
    SurfaceFatal { reason: String },
}

impl RenderEvent {
    /// Human-readable text suitable for a one-shot notification.
    pub fn user_message(&self) -> String {
        match self {
            RenderEvent::ShaderCompilerUnsupported => {
                SHADER_COMPILER_UNSUPPORTED_MESSAGE.to_string()
            }
            RenderEvent::ShaderBuildFailed { log } => {
                format!("The wallpaper shader could not be built:\n{log}")
            }
            RenderEvent::SurfaceFatal { reason } => {
                format!("The wallpaper surface stopped working: {reason}")
            }
        }
    }
}

pub type EventSender = Sender<RenderEvent>;
pub type EventReceiver = Receiver<RenderEvent>;

/// Creates the unbounded channel the render loop reports through.
pub fn channel() -> (EventSender, EventReceiver) {
    unbounded()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_compiler_message_is_stable() {
        assert_eq!(
            RenderEvent::ShaderCompilerUnsupported.user_message(),
            "Your device does not support runtime shader compilation."
        );
    }

    #[test]
    fn build_failure_message_carries_log() {
        let event = RenderEvent::ShaderBuildFailed {
            log: "0:12: 'uTouchPos' : undeclared identifier".into(),
        };
        assert!(event.user_message().contains("undeclared identifier"));
    }
}
