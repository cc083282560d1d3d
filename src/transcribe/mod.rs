//! Video-to-transcript jobs: download audio, transcribe it, optionally
//! summarize, and store the result in a search index.

pub mod index;
pub mod media;
pub mod pipeline;
pub mod summarizer;
pub mod transcriber;

pub use index::{IndexError, OpenSearchIndex, SearchIndex, TranscriptDocument};
pub use media::{AudioArtifact, AudioPreprocess, MediaError, MediaSource, YtDlpSource};
pub use pipeline::{TranscriptionPipeline, summarize_records, transcribe_batch};
pub use summarizer::Summarizer;
pub use transcriber::{HttpTranscriber, TranscribeError, Transcriber};
