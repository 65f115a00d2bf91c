pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Kubernetes reported error: {source}")]
    KubeError { source: kube::Error },
    #[error("Update conflict: {0}")]
    Conflict(String),
    #[error("Object already exists: {0}")]
    AlreadyExists(String),
    #[error("Invalid labels in ConfigMap {name}: {source}")]
    ConfigDecode {
        name: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Invalid Ingress: {0}")]
    InvalidIngress(String),
}

impl Error {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_) | Error::AlreadyExists(_))
    }
}

// 409s are split out so the controller can tell optimistic-concurrency losses
// apart from transport or permission failures.
impl From<kube::Error> for Error {
    fn from(source: kube::Error) -> Self {
        match source {
            kube::Error::Api(resp) if resp.code == 409 && resp.reason == "AlreadyExists" => {
                Error::AlreadyExists(resp.message)
            }
            kube::Error::Api(resp) if resp.code == 409 => Error::Conflict(resp.message),
            source => Error::KubeError { source },
        }
    }
}

/// True when the API server answered 404 for the request.
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 404)
}

#[cfg(test)]
pub(crate) fn api_error(code: u16, reason: &str) -> kube::Error {
    kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{reason} ({code})"),
        reason: reason.to_string(),
        code,
    })
}
