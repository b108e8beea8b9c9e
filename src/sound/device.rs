//! Primary tier: a pre-loaded tone played through the default output device
//!
//! The tone is decoded once with symphonia (which reads AIFF, the format of
//! the stock macOS sounds) into interleaved samples. rodio's output stream
//! is not `Send`, so it lives on its own thread and play requests are
//! forwarded to it. Each request is acknowledged once the sink has accepted
//! the tone.

use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as DecodeError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info};

use super::player::{SoundError, ToneOutput};
use super::volume::Volume;

/// How long a play request may wait for the output thread
const ACCEPT_TIMEOUT: Duration = Duration::from_millis(250);

/// Decoded PCM, ready to hand to a sink
#[derive(Debug, Clone)]
pub struct Tone {
    channels: u16,
    sample_rate: u32,
    samples: Arc<[f32]>,
}

impl Tone {
    /// Decode the whole file into interleaved f32 samples
    pub fn decode(path: &Path) -> Result<Self, SoundError> {
        let unavailable = |what: &str, e: &dyn std::fmt::Display| {
            SoundError::PlaybackUnavailable(format!("{what} {}: {e}", path.display()))
        };

        let file = std::fs::File::open(path).map_err(|e| unavailable("reading", &e))?;
        let stream = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| unavailable("decoding", &e))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| unavailable("decoding", &"no audio track"))?;
        let track_id = track.id;
        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| unavailable("decoding", &e))?;

        let mut samples = Vec::new();
        let mut layout = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(DecodeError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break
                }
                Err(e) => return Err(unavailable("decoding", &e)),
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = decoder
                .decode(&packet)
                .map_err(|e| unavailable("decoding", &e))?;
            let spec = *decoded.spec();
            let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            buffer.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buffer.samples());
            layout.get_or_insert((spec.channels.count() as u16, spec.rate));
        }

        let (channels, sample_rate) =
            layout.ok_or_else(|| unavailable("decoding", &"no samples"))?;

        Ok(Self {
            channels,
            sample_rate,
            samples: samples.into(),
        })
    }

    fn source(&self) -> SamplesBuffer<f32> {
        SamplesBuffer::new(self.channels, self.sample_rate, self.samples.to_vec())
    }
}

struct PlayRequest {
    volume: f32,
    /// The caller stops waiting after this
    deadline: Instant,
    reply: SyncSender<Result<(), String>>,
}

/// Decoded-once tone bound to the default output device
pub struct DeviceTone {
    requests: Sender<PlayRequest>,
}

impl DeviceTone {
    /// Decode the tone, then open the output device
    pub fn load(path: &Path) -> Result<Self, SoundError> {
        let tone = Tone::decode(path)?;
        debug!(
            channels = tone.channels,
            sample_rate = tone.sample_rate,
            samples = tone.samples.len(),
            "tone decoded"
        );

        let (request_tx, request_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        thread::Builder::new()
            .name("tone-output".to_string())
            .spawn(move || output_thread(tone, request_rx, ready_tx))
            .map_err(|e| SoundError::PlaybackUnavailable(format!("spawning output thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                requests: request_tx,
            }),
            Ok(Err(reason)) => Err(SoundError::PlaybackUnavailable(reason)),
            Err(_) => Err(SoundError::PlaybackUnavailable(
                "output thread exited during startup".into(),
            )),
        }
    }
}

impl ToneOutput for DeviceTone {
    fn name(&self) -> &'static str {
        "output-device"
    }

    fn play(&self, volume: Volume) -> Result<(), SoundError> {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        self.requests
            .send(PlayRequest {
                volume: volume.get(),
                deadline: Instant::now() + ACCEPT_TIMEOUT,
                reply: reply_tx,
            })
            .map_err(|_| SoundError::PlaybackUnavailable("output thread is gone".into()))?;

        match reply_rx.recv_timeout(ACCEPT_TIMEOUT) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(SoundError::PlaybackUnavailable(reason)),
            Err(_) => Err(SoundError::PlaybackUnavailable(
                "output did not accept the tone in time".into(),
            )),
        }
    }
}

fn output_thread(tone: Tone, requests: Receiver<PlayRequest>, ready: SyncSender<Result<(), String>>) {
    // Dropping the stream closes the device, so keep it for the thread's life
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            let _ = ready.send(Err(format!("no default output device: {e}")));
            return;
        }
    };
    let _ = ready.send(Ok(()));
    info!("tone output thread started");

    let mut current: Option<Sink> = None;

    serve_requests(requests, |volume| {
        // Restart rather than overlap a tone that is still sounding
        if let Some(sink) = current.take() {
            sink.stop();
        }
        current = Some(start_tone(&handle, &tone, volume)?);
        Ok(())
    });

    debug!("tone output thread stopped");
}

/// Answer play requests in order, dropping any whose caller already gave up
///
/// The caller falls back to the next tier on timeout, so playing an
/// expired request would sound the beep twice.
fn serve_requests(
    requests: Receiver<PlayRequest>,
    mut start: impl FnMut(f32) -> Result<(), String>,
) {
    while let Ok(request) = requests.recv() {
        if Instant::now() >= request.deadline {
            debug!("dropping tone request that outlived its caller");
            continue;
        }
        let _ = request.reply.send(start(request.volume));
    }
}

fn start_tone(handle: &OutputStreamHandle, tone: &Tone, volume: f32) -> Result<Sink, String> {
    let sink = Sink::try_new(handle).map_err(|e| e.to_string())?;
    sink.set_volume(volume);
    sink.append(tone.source());
    Ok(sink)
}
