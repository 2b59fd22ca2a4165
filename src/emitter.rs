//! Response emitter: frames an article stream as one JSON array, written
//! element by element as articles arrive. `[` goes out before the first
//! article is resolved and `]` after the engine ends the stream.

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use futures::future::ready;
use futures::stream::{self, Stream, StreamExt};

use crate::content::Article;

/// Byte chunks of the JSON array, one per article plus the brackets.
/// An article that fails to serialize is logged and left out.
pub fn json_array_chunks<S>(articles: S) -> impl Stream<Item = Bytes> + Send + 'static
where
    S: Stream<Item = Article> + Send + 'static,
{
    let mut wrote_any = false;
    let items = articles.filter_map(move |article| {
        let chunk = match serde_json::to_vec(&article) {
            Ok(json) => {
                let mut buf = Vec::with_capacity(json.len() + 1);
                if wrote_any {
                    buf.push(b',');
                }
                wrote_any = true;
                buf.extend_from_slice(&json);
                Some(Bytes::from(buf))
            }
            Err(e) => {
                tracing::warn!(target: "feed", article_id = %article.id, error = %e, "article serialization failed, skipping");
                None
            }
        };
        ready(chunk)
    });

    stream::once(ready(Bytes::from_static(b"[")))
        .chain(items)
        .chain(stream::once(ready(Bytes::from_static(b"]"))))
}

/// Streaming HTTP body for the feed response.
pub fn json_array_body<S>(articles: S) -> Body
where
    S: Stream<Item = Article> + Send + 'static,
{
    Body::from_stream(json_array_chunks(articles).map(Ok::<_, Infallible>))
}
