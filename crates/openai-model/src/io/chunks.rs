#[cfg(test)]
use std::collections::VecDeque;

use bytes::Bytes;
use reqwest::Response;

/// The body stream broke off.
#[derive(Debug, PartialEq, Eq)]
pub struct Error(pub String);

enum Source {
    Live(Response),
    #[cfg(test)]
    Scripted(VecDeque<Bytes>),
}

/// Raw body chunks of a streamed reply, as they arrive.
pub struct Chunks {
    source: Source,
    received: usize,
}

impl Chunks {
    pub fn from_response(response: Response) -> Self {
        Self::with_source(Source::Live(response))
    }

    /// Replays the given chunks, for parsing tests.
    #[cfg(test)]
    pub fn scripted(chunks: impl IntoIterator<Item = Bytes>) -> Self {
        Self::with_source(Source::Scripted(chunks.into_iter().collect()))
    }

    fn with_source(source: Source) -> Self {
        Self {
            source,
            received: 0,
        }
    }

    /// Returns the next chunk, or `None` once the body is complete.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        let chunk = match &mut self.source {
            Source::Live(response) => response
                .chunk()
                .await
                .map_err(|err| Error(format!("{err}")))?,
            #[cfg(test)]
            Source::Scripted(chunks) => chunks.pop_front(),
        };
        match &chunk {
            Some(bytes) => self.received += bytes.len(),
            None => trace!("body complete after {} bytes", self.received),
        }
        Ok(chunk)
    }
}
