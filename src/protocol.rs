use crate::{Result, error::GpsdError};

pub mod v3;

pub trait GpsdJsonRequest {
    fn to_command(&self) -> Result<String>;
}

/// Line-oriented reading of GPSD records from an async buffered source
pub trait GpsdJsonDecodeAsync: futures_io::AsyncBufRead + Unpin {
    /// Reads one newline-terminated record into `buf`, replacing its contents
    ///
    /// Resolves to `Ok(false)` once the peer has closed the stream.
    fn read_record(&mut self, buf: &mut Vec<u8>) -> impl Future<Output = Result<bool>> {
        async move {
            use futures_util::AsyncBufReadExt;

            buf.clear();
            let bytes_read = self
                .read_until(b'\n', buf)
                .await
                .map_err(GpsdError::IoError)?;
            Ok(bytes_read != 0)
        }
    }
}

impl<R: futures_io::AsyncBufRead + Unpin> GpsdJsonDecodeAsync for R {}

pub trait GpsdJsonEncodeAsync: futures_io::AsyncWrite + Unpin {
    fn write_request(&mut self, request: &impl GpsdJsonRequest) -> impl Future<Output = Result<()>> {
        let cmd = request.to_command();
        async move {
            use futures_util::AsyncWriteExt;

            let cmd = cmd?;
            self.write_all(cmd.as_bytes())
                .await
                .map_err(GpsdError::IoError)?;
            self.flush().await.map_err(GpsdError::IoError)
        }
    }
}

impl<W: futures_io::AsyncWrite + Unpin> GpsdJsonEncodeAsync for W {}
