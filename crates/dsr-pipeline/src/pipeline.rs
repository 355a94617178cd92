// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The generic per-kind load pipeline: a bytes port and a file port, each a
//! bounded worker pool around one [`Decoder`].

use crate::pool::BoundedPool;
use dsr_core::error::ResourceError;
use dsr_core::interfaces::Decoder;
use dsr_core::request::{LoadReply, LoadRequest};
use dsr_core::resource::Payload;
use std::sync::Arc;
use tokio::sync::oneshot;

/// A per-resource-kind pipeline exposing a `bytes` port and a `file` port,
/// each backed by [`BoundedPool`].
///
/// Generic over the decoded payload type `P`; the caller supplies `wrap` to
/// lift `P` into the tagged [`dsr_core::resource::ResourceValue`] the reply
/// buffer carries, since the pipeline itself never needs to know its own
/// `ResourceKind` beyond that.
pub struct Pipeline<P: Payload> {
    bytes_port: BoundedPool<LoadRequest>,
    file_port: BoundedPool<LoadRequest>,
    _marker: std::marker::PhantomData<P>,
}

impl<P: Payload> Pipeline<P> {
    /// Builds a pipeline around `decoder`, publishing successful replies
    /// into `reply_tx` and wrapping `P` into a `ResourceValue` via `wrap`.
    pub fn new<D, W>(
        decoder: D,
        wrap: W,
        reply_tx: crossbeam_channel::Sender<LoadReply>,
        parallelism: usize,
    ) -> Self
    where
        D: Decoder<P> + 'static,
        W: Fn(P) -> dsr_core::resource::ResourceValue + Send + Sync + 'static,
    {
        let decoder = Arc::new(decoder);
        let wrap = Arc::new(wrap);

        let bytes_decoder = decoder.clone();
        let bytes_wrap = wrap.clone();
        let bytes_reply = reply_tx.clone();
        let bytes_port = BoundedPool::new(parallelism, parallelism * 2, move |req| {
            Self::process(&*bytes_decoder, &*bytes_wrap, &bytes_reply, req)
        });

        let file_decoder = decoder;
        let file_wrap = wrap;
        let file_reply = reply_tx;
        let file_port = BoundedPool::new(parallelism, parallelism * 2, move |req| {
            Self::process(&*file_decoder, &*file_wrap, &file_reply, req)
        });

        Self {
            bytes_port,
            file_port,
            _marker: std::marker::PhantomData,
        }
    }

    fn process<D, W>(decoder: &D, wrap: &W, reply_tx: &crossbeam_channel::Sender<LoadReply>, req: LoadRequest)
    where
        D: Decoder<P>,
        W: Fn(P) -> dsr_core::resource::ResourceValue,
    {
        let path = req.path().clone();
        let outcome = match req {
            LoadRequest::Bytes {
                bytes, access, game, ..
            } => decoder.decode_bytes(&bytes, access, game).map(|p| (p, access)),
            LoadRequest::File {
                real_path,
                access,
                game,
                ..
            } => decoder
                .decode_file(&real_path, access, game)
                .map(|p| (p, access)),
            LoadRequest::TextureSlot { .. } => {
                log::warn!("non-texture pipeline received a TextureSlot request for {path}, dropping");
                return;
            }
        };
        match outcome {
            Ok((payload, access)) => {
                let reply = LoadReply {
                    path,
                    access,
                    resource: wrap(payload),
                };
                if reply_tx.send(reply).is_err() {
                    log::warn!("reply buffer closed while posting a decoded resource");
                }
            }
            Err(err) => Self::log_recoverable(&err),
        }
    }

    fn log_recoverable(err: &ResourceError) {
        debug_assert!(!err.is_fatal(), "decode errors must never be fatal kinds");
        log::warn!("dropping request: {err}");
    }

    /// Posts a bytes-port request.
    pub fn post_bytes(&self, req: LoadRequest) -> bool {
        self.bytes_port.post(req)
    }

    /// Posts a file-port request.
    pub fn post_file(&self, req: LoadRequest) -> bool {
        self.file_port.post(req)
    }

    /// Closes both ports and returns a receiver firing once all in-flight
    /// work on both has drained.
    pub fn complete(&self) -> oneshot::Receiver<()> {
        let bytes_done = self.bytes_port.complete();
        let file_done = self.file_port.complete();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let _ = bytes_done.await;
            let _ = file_done.await;
            let _ = tx.send(());
        });
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsr_core::access::AccessLevel;
    use dsr_core::interfaces::GameFamily;
    use dsr_core::path::VirtualPath;
    use dsr_core::resource::{FlverPayload, ResourceValue};

    struct EchoDecoder;
    impl Decoder<FlverPayload> for EchoDecoder {
        fn decode_bytes(
            &self,
            buf: &[u8],
            _access: AccessLevel,
            _game: GameFamily,
        ) -> Result<FlverPayload, ResourceError> {
            Ok(FlverPayload { bytes: buf.to_vec() })
        }
        fn decode_file(
            &self,
            _path: &std::path::Path,
            _access: AccessLevel,
            _game: GameFamily,
        ) -> Result<FlverPayload, ResourceError> {
            Ok(FlverPayload::default())
        }
    }

    #[tokio::test]
    async fn bytes_port_emits_a_reply_on_success() {
        let (reply_tx, reply_rx) = crossbeam_channel::unbounded();
        let pipeline = Pipeline::new(EchoDecoder, ResourceValue::Flver, reply_tx, 2);
        pipeline.post_bytes(LoadRequest::Bytes {
            path: VirtualPath::new("chr/c0001/c0001.flv"),
            bytes: b"hello".to_vec(),
            access: AccessLevel::EditOnly,
            game: GameFamily::EldenRing,
        });
        pipeline.complete().await.unwrap();
        let reply = reply_rx.try_recv().expect("expected one reply");
        assert_eq!(reply.path.as_str(), "chr/c0001/c0001.flv");
        assert_eq!(reply.access, AccessLevel::EditOnly);
        assert!(matches!(reply.resource, ResourceValue::Flver(_)));
    }

    struct FailingDecoder;
    impl Decoder<FlverPayload> for FailingDecoder {
        fn decode_bytes(
            &self,
            _buf: &[u8],
            _access: AccessLevel,
            _game: GameFamily,
        ) -> Result<FlverPayload, ResourceError> {
            Err(ResourceError::FormatError {
                path: VirtualPath::new("x"),
                source: anyhow::anyhow!("bad data"),
            })
        }
        fn decode_file(
            &self,
            _path: &std::path::Path,
            _access: AccessLevel,
            _game: GameFamily,
        ) -> Result<FlverPayload, ResourceError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn recoverable_decode_error_drops_silently() {
        let (reply_tx, reply_rx) = crossbeam_channel::unbounded();
        let pipeline = Pipeline::new(FailingDecoder, ResourceValue::Flver, reply_tx, 1);
        pipeline.post_bytes(LoadRequest::Bytes {
            path: VirtualPath::new("x"),
            bytes: vec![],
            access: AccessLevel::Full,
            game: GameFamily::EldenRing,
        });
        pipeline.complete().await.unwrap();
        assert!(reply_rx.try_recv().is_err(), "no reply should be posted");
    }
}
