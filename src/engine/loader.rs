//! Sample loading: fetch bytes, verify, decode, and memoize per sound id.
//!
//! Each id owns a slot bound to the source it was registered with. Concurrent
//! `load` calls for that source await the same `OnceCell` instead of
//! fetching twice. Failures are cached as `None` too, so a broken asset is
//! fetched once and then stays silent until its descriptor is re-registered
//! with a new source. A load for a source the id no longer points at still
//! decodes for its caller but never lands in the cache.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use base64::Engine as _;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;

use crate::dsp::sampler::SampleBuffer;
use crate::error::{AudioError, DecodeError, FetchError};

use super::registry::SampleRef;

#[derive(Debug)]
struct Slot {
    source: SampleRef,
    buffer: OnceCell<Option<Arc<SampleBuffer>>>,
}

impl Slot {
    fn new(source: &SampleRef) -> Arc<Self> {
        Arc::new(Slot {
            source: source.clone(),
            buffer: OnceCell::new(),
        })
    }
}

#[derive(Debug, Default)]
pub struct SampleLoader {
    slots: Mutex<HashMap<String, Arc<Slot>>>,
    fetches: AtomicUsize,
}

impl SampleLoader {
    pub fn new() -> Self {
        SampleLoader::default()
    }

    /// Point `id` at `source`. A slot for any other source is dropped along
    /// with whatever it decoded. Returns true when that happened.
    pub fn track(&self, id: &str, source: &SampleRef) -> bool {
        let mut slots = self.slots.lock();
        match slots.get(id) {
            Some(slot) if slot.source == *source => false,
            previous => {
                let replaced = previous.is_some();
                slots.insert(id.to_string(), Slot::new(source));
                replaced
            }
        }
    }

    /// Decoded buffer if `id` has already finished loading successfully.
    pub fn cached(&self, id: &str) -> Option<Arc<SampleBuffer>> {
        self.slots.lock().get(id).and_then(|slot| slot.buffer.get().cloned().flatten())
    }

    /// True once `id` has settled, successfully or not.
    pub fn is_settled(&self, id: &str) -> bool {
        self.slots.lock().get(id).is_some_and(|slot| slot.buffer.initialized())
    }

    /// Fetch and decode `id` once. `None` means the sound is unavailable.
    pub async fn load(&self, id: &str, source: &SampleRef) -> Option<Arc<SampleBuffer>> {
        let slot = {
            let mut slots = self.slots.lock();
            match slots.get(id) {
                Some(slot) if slot.source == *source => Some(Arc::clone(slot)),
                Some(_) => None,
                None => {
                    let slot = Slot::new(source);
                    slots.insert(id.to_string(), Arc::clone(&slot));
                    Some(slot)
                }
            }
        };
        match slot {
            Some(slot) => slot.buffer.get_or_init(|| self.fetch(id, source)).await.clone(),
            None => {
                tracing::debug!(id, "source was re-registered, decoding without caching");
                self.fetch(id, source).await
            }
        }
    }

    async fn fetch(&self, id: &str, source: &SampleRef) -> Option<Arc<SampleBuffer>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        match fetch_and_decode(source).await {
            Ok(buffer) => {
                tracing::debug!(
                    id,
                    frames = buffer.len(),
                    rate = buffer.sample_rate,
                    "decoded sample"
                );
                Some(Arc::new(buffer))
            }
            Err(e) => {
                tracing::warn!(id, source = %source.describe(), "sound unavailable: {e}");
                None
            }
        }
    }

    pub fn clear(&self) {
        self.slots.lock().clear();
    }

    /// Number of fetch+decode attempts actually started.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

pub async fn fetch_and_decode(source: &SampleRef) -> Result<SampleBuffer, AudioError> {
    let bytes = fetch_bytes(source).await?;
    // decoding is CPU-bound; keep it off the async workers
    let buffer = tokio::task::spawn_blocking(move || decode(&bytes))
        .await
        .map_err(|e| DecodeError::Wav(format!("decode task failed: {e}")))??;
    Ok(buffer)
}

pub async fn fetch_bytes(source: &SampleRef) -> Result<Vec<u8>, FetchError> {
    match source {
        SampleRef::Inline { data } => {
            let payload = data.split_once(";base64,").map_or(data.as_str(), |(_, b64)| b64);
            base64::engine::general_purpose::STANDARD
                .decode(payload.trim())
                .map_err(|e| FetchError::InvalidInline(e.to_string()))
        }
        SampleRef::External { url, sha256 } => {
            let bytes = if url.starts_with("http://") || url.starts_with("https://") {
                fetch_http(url).await?
            } else {
                let path = url.strip_prefix("file://").unwrap_or(url);
                tokio::fs::read(path).await.map_err(|source| FetchError::Io {
                    url: url.clone(),
                    source,
                })?
            };
            if let Some(expected) = sha256 {
                verify_sha256(url, &bytes, expected)?;
            }
            Ok(bytes)
        }
    }
}

#[cfg(feature = "http")]
async fn fetch_http(url: &str) -> Result<Vec<u8>, FetchError> {
    let http_err = |status: Option<u16>, message: String| FetchError::Http {
        url: url.to_string(),
        status,
        message,
    };
    let response = reqwest::get(url).await.map_err(|e| http_err(None, e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(http_err(Some(status.as_u16()), status.to_string()));
    }
    let bytes = response.bytes().await.map_err(|e| http_err(None, e.to_string()))?;
    Ok(bytes.to_vec())
}

#[cfg(not(feature = "http"))]
async fn fetch_http(url: &str) -> Result<Vec<u8>, FetchError> {
    Err(FetchError::UnsupportedScheme { url: url.to_string() })
}

fn verify_sha256(url: &str, bytes: &[u8], expected: &str) -> Result<(), FetchError> {
    let actual: String = Sha256::digest(bytes).iter().map(|b| format!("{b:02x}")).collect();
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(FetchError::ChecksumMismatch {
            url: url.to_string(),
            expected: expected.to_string(),
            actual,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Codec {
    Wav,
    Mp3,
}

fn sniff(bytes: &[u8]) -> Option<Codec> {
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
        Some(Codec::Wav)
    } else if bytes.starts_with(b"ID3")
        || (bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0)
    {
        Some(Codec::Mp3)
    } else {
        None
    }
}

/// Decode a complete WAV or MP3 file to mono.
pub fn decode(bytes: &[u8]) -> Result<SampleBuffer, DecodeError> {
    let buffer = match sniff(bytes).ok_or(DecodeError::UnknownFormat)? {
        Codec::Wav => decode_wav(bytes)?,
        Codec::Mp3 => decode_mp3(bytes)?,
    };
    if buffer.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(buffer)
}

fn decode_wav(bytes: &[u8]) -> Result<SampleBuffer, DecodeError> {
    let reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };
    Ok(SampleBuffer::from_f32(&samples, channels, spec.sample_rate))
}

fn decode_mp3(bytes: &[u8]) -> Result<SampleBuffer, DecodeError> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(bytes));
    let mut pcm: Vec<i16> = Vec::new();
    let mut format: Option<(usize, u32)> = None;
    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                let frame_format = (frame.channels.max(1), frame.sample_rate.max(1) as u32);
                if format.is_some_and(|f| f != frame_format) {
                    // mid-stream format changes are not worth supporting
                    break;
                }
                format = Some(frame_format);
                pcm.extend_from_slice(&frame.data);
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) if pcm.is_empty() => return Err(DecodeError::Mp3(format!("{e:?}"))),
            Err(_) => break,
        }
    }
    let (channels, sample_rate) = format.ok_or(DecodeError::Empty)?;
    Ok(SampleBuffer::from_i16(&pcm, channels, sample_rate))
}
