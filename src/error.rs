use std::{fmt, io};

#[derive(Debug)]
pub enum Error {
    InvalidArgument(&'static str),
    EmptySketch,
    IoError(io::ErrorKind),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::InvalidArgument(arg) => write!(f, "Invalid argument: {}", arg),
            Error::EmptySketch => write!(f, "Empty sketch"),
            Error::IoError(ref cause) => write!(f, "Io Error: {}", cause),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::IoError(error.kind())
    }
}
