use std::sync::mpsc::{Receiver, Sender};

use tracing::{debug, warn};

use crate::api::{ApiError, ApiResponse, ConsoleClient, Transport};
use crate::login::{LoginTestRequest, LoginTestResult};
use crate::validation::{QueryValidationState, ValidationQuery};

pub type ValidationReply = Result<ApiResponse<QueryValidationState>, ApiError>;
pub type LoginTestReply = Result<ApiResponse<LoginTestResult>, ApiError>;

pub enum WorkerRequest {
    /// Validate a query, sending the verdict on the provided channel.
    ValidateQuery {
        query: ValidationQuery,
        respond_to: Sender<ValidationReply>,
    },

    /// Run a login test, sending the result on the provided channel.
    TestLogin {
        request: LoginTestRequest,
        respond_to: Sender<LoginTestReply>,
    },
}

/// Handle for sending work to the worker.
#[derive(Clone)]
pub struct WorkerHandle {
    sender: Sender<WorkerRequest>,
}

impl WorkerHandle {
    pub fn send(&self, req: WorkerRequest) {
        // Best-effort send; if worker is gone, the reply channel just closes.
        if self.sender.send(req).is_err() {
            warn!("request dropped, worker is no longer running");
        }
    }

    pub fn validate_query(&self, query: ValidationQuery) -> Receiver<ValidationReply> {
        let (tx, rx) = std::sync::mpsc::channel();
        self.send(WorkerRequest::ValidateQuery {
            query,
            respond_to: tx,
        });
        rx
    }

    pub fn test_login(&self, request: LoginTestRequest) -> Receiver<LoginTestReply> {
        let (tx, rx) = std::sync::mpsc::channel();
        self.send(WorkerRequest::TestLogin {
            request,
            respond_to: tx,
        });
        rx
    }
}

/// Spawn the worker thread and return a handle for sending it requests.
///
/// The worker runs a single-threaded Tokio runtime and handles requests one
/// at a time in arrival order. A later request never cancels an earlier one.
pub fn spawn_worker<T>(client: ConsoleClient<T>) -> std::io::Result<WorkerHandle>
where
    T: Transport + 'static,
{
    let (tx, rx): (Sender<WorkerRequest>, Receiver<WorkerRequest>) = std::sync::mpsc::channel();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    std::thread::Builder::new()
        .name("console-worker".to_string())
        .spawn(move || {
            rt.block_on(worker_loop(client, rx));
        })?;

    Ok(WorkerHandle { sender: tx })
}

async fn worker_loop<T: Transport>(client: ConsoleClient<T>, rx: Receiver<WorkerRequest>) {
    while let Ok(req) = rx.recv() {
        match req {
            WorkerRequest::ValidateQuery { query, respond_to } => {
                let result = client.validate_query(&query).await;
                let _ = respond_to.send(result);
            }
            WorkerRequest::TestLogin {
                request,
                respond_to,
            } => {
                let result = client.test_login(&request).await;
                let _ = respond_to.send(result);
            }
        }
    }
    debug!("all worker handles dropped, stopping");
}
