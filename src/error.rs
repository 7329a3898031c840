pub type MotionvizResult<T> = Result<T, MotionvizError>;

#[derive(thiserror::Error, Debug)]
pub enum MotionvizError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("remote storage error: {0}")]
    Remote(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("render error: {0}")]
    Render(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MotionvizError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            MotionvizError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            MotionvizError::remote("x")
                .to_string()
                .contains("remote storage error:")
        );
        assert!(
            MotionvizError::decode("x")
                .to_string()
                .contains("decode error:")
        );
        assert!(
            MotionvizError::render("x")
                .to_string()
                .contains("render error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = MotionvizError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
