//! Spoken output and SSML rendering.
//!
//! Generated story text is read in a separate voice so listeners can tell
//! it apart from the assistant's own instructions. Every text segment is
//! XML-escaped on the way out, so `<`, `>`, `&` can never open markup.

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Plain(String),
    Voiced { voice: String, text: String },
}

/// A sequence of spoken segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Speech {
    segments: Vec<Segment>,
}

/// Escape a string for safe inclusion in XML content.
fn xml_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            _ => result.push(c),
        }
    }
    result
}

impl Speech {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::default().then(text)
    }

    /// Append text in the assistant's voice.
    pub fn then(mut self, text: impl Into<String>) -> Self {
        self.segments.push(Segment::Plain(text.into()));
        self
    }

    /// Append text read by `voice`.
    pub fn voiced(mut self, voice: &str, text: impl Into<String>) -> Self {
        self.segments.push(Segment::Voiced {
            voice: voice.to_string(),
            text: text.into(),
        });
        self
    }

    /// Render as an SSML document.
    ///
    /// ```xml
    /// <speak><voice name='Joey'>the dragon woke up</voice> Say, continue...</speak>
    /// ```
    pub fn to_ssml(&self) -> String {
        let mut ssml = String::from("<speak>");
        for segment in &self.segments {
            match segment {
                Segment::Plain(text) => ssml.push_str(&xml_escape(text)),
                Segment::Voiced { voice, text } => {
                    ssml.push_str(&format!(
                        "<voice name='{}'>{}</voice>",
                        xml_escape(voice).replace('\'', "&apos;"),
                        xml_escape(text)
                    ));
                }
            }
        }
        ssml.push_str("</speak>");
        ssml
    }

    /// Concatenated text without markup.
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Plain(text) => text.as_str(),
                Segment::Voiced { text, .. } => text.as_str(),
            })
            .collect()
    }
}

/// What one handler wants said back to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub speech: Option<Speech>,
    pub reprompt: Option<Speech>,
    /// `None` leaves the decision to the platform.
    pub end_session: Option<bool>,
}

impl Reply {
    /// No speech at all.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn speak(speech: Speech) -> Self {
        Self {
            speech: Some(speech),
            ..Self::default()
        }
    }

    /// Keep the session open, asking again with `speech` on silence.
    pub fn reprompt(mut self, speech: Speech) -> Self {
        self.reprompt = Some(speech);
        self.end_session = Some(false);
        self
    }

    pub fn end_session(mut self) -> Self {
        self.end_session = Some(true);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape("hello"), "hello");
        assert_eq!(xml_escape("<script>"), "&lt;script&gt;");
        assert_eq!(xml_escape("a & b"), "a &amp; b");
    }

    #[test]
    fn test_plain_ssml() {
        let ssml = Speech::plain("Goodbye!").to_ssml();
        assert_eq!(ssml, "<speak>Goodbye!</speak>");
    }

    #[test]
    fn test_voiced_segments() {
        let speech = Speech::default()
            .voiced("Joey", "the dragon woke up")
            .voiced("Joey", "and flew away.")
            .then(" Say, continue.");
        assert_eq!(
            speech.to_ssml(),
            "<speak><voice name='Joey'>the dragon woke up</voice>\
             <voice name='Joey'>and flew away.</voice> Say, continue.</speak>"
        );
        assert_eq!(
            speech.text(),
            "the dragon woke upand flew away. Say, continue."
        );
    }

    #[test]
    fn test_cannot_inject_markup() {
        let speech = Speech::plain("You just triggered </speak><audio src='x'/>");
        let ssml = speech.to_ssml();
        assert!(!ssml.contains("</speak><audio"));
        assert!(ssml.ends_with("</speak>"));
        assert_eq!(ssml.matches("</speak>").count(), 1);
    }

    #[test]
    fn test_voice_name_cannot_close_attribute() {
        let ssml = Speech::default().voiced("Jo'ey", "hi").to_ssml();
        assert!(ssml.contains("name='Jo&apos;ey'"));
    }

    #[test]
    fn test_reply_builders() {
        let reply = Reply::speak(Speech::plain("hi")).reprompt(Speech::plain("again?"));
        assert_eq!(reply.end_session, Some(false));
        assert!(reply.reprompt.is_some());

        let bye = Reply::speak(Speech::plain("Goodbye!")).end_session();
        assert_eq!(bye.end_session, Some(true));
        assert!(bye.reprompt.is_none());

        assert_eq!(Reply::empty().speech, None);
    }
}
