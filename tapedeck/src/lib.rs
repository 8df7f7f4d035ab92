mod capture_store;
mod configuration;
mod data;
mod error;
pub mod filter;
mod interception;
mod live;
pub mod matcher;
mod playback;
mod proxy;
mod session;
mod storage;
mod transport;

pub use capture_store::CaptureStore;
pub use configuration::{
    MatchingConfiguration, MissPolicy, ResponseHeaderPolicy, Settings, DEFAULT_FIXTURES_DIR,
    FIXTURES_DIR_ENV,
};
pub use data::{
    CaptureFile, CaptureMeta, CapturedExchange, Headers, RequestDescriptor, ResponseDescriptor,
    SCHEMA_VERSION,
};
pub use error::{Error, Result};
pub use interception::{end_session, exclusive_access, interception_point, start_session};
pub use live::LiveRequest;
pub use playback::{
    build_response, normalize_response, CandidateView, Lookup, MismatchDiagnostics,
    PlaybackEngine, RequestView,
};
pub use proxy::InterceptionProxy;
pub use session::{SessionController, SessionMode, SessionReport};
pub use storage::{fixture_file_name, FileStorage, FixtureStorage, MemoryStorage};
pub use tapedeck_codegen::session_test;
pub use transport::{HyperTransport, Transport};

#[doc(hidden)]
pub mod __private {
    use crate::{interception, MatchingConfiguration};
    use futures::FutureExt;
    use std::{future::Future, panic::AssertUnwindSafe};

    /// Body of a `#[session_test]`: the session always ends, even when the test panics.
    pub async fn run_session<F: Future<Output = ()>>(
        session_name: &str,
        configuration: MatchingConfiguration,
        test: F,
    ) {
        let _guard = interception::exclusive_access().await;

        if let Err(e) = interception::start_session(session_name, Some(configuration)).await {
            panic!("Tapedeck Error: {}", e);
        }

        let outcome = AssertUnwindSafe(test).catch_unwind().await;
        let ended = interception::end_session().await;

        if let Err(panic) = outcome {
            std::panic::resume_unwind(panic);
        }
        if let Err(e) = ended {
            panic!("Tapedeck Error: {}", e);
        }
    }
}
