use crate::error::StoreError;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

/// Records produced by a query, decoded one row at a time in database order.
///
/// Holds the connection's cursor: no other statement can run on the same handle until this is
/// dropped or drained. It cannot be restarted; run the query again instead.
pub struct Rows<'c, T> {
    inner: BoxStream<'c, Result<T, StoreError>>,
}

impl<'c, T> Rows<'c, T> {
    pub(crate) fn new(inner: BoxStream<'c, Result<T, StoreError>>) -> Self {
        Self { inner }
    }

    /// Drain the rest of the stream. Stops at the first error.
    pub async fn collect_all(mut self) -> Result<Vec<T>, StoreError> {
        let mut out = Vec::new();
        while let Some(item) = self.inner.next().await {
            out.push(item?);
        }
        Ok(out)
    }
}

impl<T> Stream for Rows<'_, T> {
    type Item = Result<T, StoreError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}
