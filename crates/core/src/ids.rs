#![forbid(unsafe_code)]

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(i64);

impl ImageId {
    pub fn get(self) -> i64 {
        self.0
    }

    pub fn try_new(value: i64) -> Result<Self, ImageIdError> {
        if value < 0 {
            return Err(ImageIdError::Negative);
        }
        Ok(Self(value))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageIdError {
    Negative,
}

impl ImageIdError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Negative => "image id must not be negative",
        }
    }
}
