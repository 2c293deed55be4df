use jarvis_core::ControlCommand;

/// Decides whether a voice run should trigger an OS action.
pub trait CommandClassifier: Send + Sync {
    fn classify(&self, transcript: &str, ai_response: &str) -> Option<ControlCommand>;
}

/// Never maps anything; voice runs stop after the AI reply.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCommandClassifier;

impl CommandClassifier for NoCommandClassifier {
    fn classify(&self, _transcript: &str, _ai_response: &str) -> Option<ControlCommand> {
        None
    }
}

/// Matches the transcript against the command vocabulary the same way the
/// backend does: first phrase contained in the lowercased utterance wins.
/// The AI response is not consulted.
#[derive(Debug, Default, Clone, Copy)]
pub struct PhraseClassifier;

impl CommandClassifier for PhraseClassifier {
    fn classify(&self, transcript: &str, _ai_response: &str) -> Option<ControlCommand> {
        let t = transcript.trim().to_lowercase();
        if t.is_empty() {
            return None;
        }
        ControlCommand::ALL
            .into_iter()
            .find(|c| t.contains(c.as_str()))
    }
}
