//! datafrog core library.
//!
//! Records the database statements an application issues while a user
//! exercises it, and later verifies that a replay of the same actions issues
//! an equivalent sequence. Volatile tokens (generated ids, timestamps) are
//! learned on the first verification and tolerated from then on.
//!
//! The engine is [`session::Recorder`] and [`session::Verifier`]; everything
//! they touch from the outside (log, clock window, patterns, tokenizer, store,
//! ids) is injected through traits.

pub mod cancel;
pub mod exit_codes;
pub mod log_source;
pub mod logging;
pub mod matching;
pub mod model;
pub mod report;
pub mod session;
pub mod store;
pub mod window;

pub use cancel::CancelToken;
pub use exit_codes::ExitCode;
pub use matching::{tokenize, Pattern, PatternSet, Token};
pub use model::{Expectation, Testcase};
pub use report::{build_report, Report};
pub use session::{
    Recorder, SessionDeps, SessionError, SessionRegistry, VerificationOutcome, Verifier,
    VerifyOptions,
};
pub use store::{FileTestcaseStore, StoreError, TestcaseStore};
