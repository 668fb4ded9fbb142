//! Storytelling skill - turns voice platform requests into story turns.

pub mod deadline;
pub mod envelope;
pub mod report;
pub mod router;
pub mod sanitize;
pub mod speech;
pub mod story;


pub use envelope::ResponseEnvelope;
pub use report::TracingReporter;
pub use router::Skill;
pub use sanitize::Sanitizer;
pub use story::Storyteller;
