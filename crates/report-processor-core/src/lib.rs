pub mod clients;
pub mod processor;
pub mod reply;
pub mod settings;
pub mod status;

pub use clients::{
    AnalysisError, AnalysisInvoker, AnalysisResult, ApplicationUpdate, HttpAnalysisClient,
    RecordUpdater, SignedUrl, SignedUrlIssuer, SupabaseRestClient, SupabaseStorageClient,
};
pub use processor::{
    ApplicationEvent, ApplicationId, ProcessError, ProcessedApplication,
    ReportProcessor, WebhookPayload, SIGNED_URL_TTL_SECS,
};
pub use reply::Reply;
pub use settings::{ProcessorSettings, DEFAULT_BUCKET};
pub use status::ApplicationStatus;
