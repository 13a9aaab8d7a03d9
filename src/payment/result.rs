use std::collections::HashMap;

/// Outcome of the prepare phase. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct PrepareResult {
    pub success: bool,
    pub message: String,
    pub context: HashMap<String, String>,
}

impl PrepareResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            context: HashMap::new(),
        }
    }

    pub fn success_with(message: impl Into<String>, context: HashMap<String, String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            context,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            context: HashMap::new(),
        }
    }

    pub fn is_failure(&self) -> bool {
        !self.success
    }
}

/// Outcome of the process phase. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct PaymentResult {
    pub success: bool,
    pub message: String,
    pub redirect: Option<String>,
    pub transaction_id: Option<String>,
    pub context: HashMap<String, String>,
}

impl PaymentResult {
    pub fn success(
        message: impl Into<String>,
        redirect: Option<String>,
        transaction_id: Option<String>,
    ) -> Self {
        Self {
            success: true,
            message: message.into(),
            redirect,
            transaction_id,
            context: HashMap::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            redirect: None,
            transaction_id: None,
            context: HashMap::new(),
        }
    }

    pub fn is_failure(&self) -> bool {
        !self.success
    }
}
