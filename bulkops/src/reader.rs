use futures::stream::{self, BoxStream, Stream, StreamExt};

use crate::dialect::BulkDatabase;
use crate::error::Result;
use crate::value::Record;

/// Forward-only stream of records, consumed by a bulk operation.
///
/// Typically opened on a source connection with [`DataReader::query`] and handed to an operation
/// running on a different destination connection.
pub struct DataReader<'a> {
    stream: BoxStream<'a, Result<Record>>,
}

impl<'a> DataReader<'a> {
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Record>> + Send + 'a,
    {
        Self { stream: stream.boxed() }
    }

    pub fn from_records(records: Vec<Record>) -> Self {
        Self::from_stream(stream::iter(records.into_iter().map(Ok)))
    }

    /// Stream the rows of `sql` from `conn`.
    pub fn query<DB: BulkDatabase>(conn: &'a mut DB::Connection, sql: &'a str) -> Self {
        Self {
            stream: DB::stream_records(conn, sql),
        }
    }

    /// Pull up to `size` records. An empty batch means the reader is exhausted.
    pub async fn next_batch(&mut self, size: usize) -> Result<Vec<Record>> {
        let mut batch = Vec::with_capacity(size.min(1024));
        while batch.len() < size {
            match self.stream.next().await {
                Some(record) => batch.push(record?),
                None => break,
            }
        }
        Ok(batch)
    }
}

impl std::fmt::Debug for DataReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataReader").finish_non_exhaustive()
    }
}
