use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rodio::Source;

/// Ring buffer between the ffmpeg audio reader and the rodio sink
pub struct AudioBuffer {
    samples: Vec<f32>,
    read_pos: usize,
    write_pos: usize,
    capacity: usize,
}

impl AudioBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity],
            read_pos: 0,
            write_pos: 0,
            capacity,
        }
    }

    /// Writes as many samples as fit; returns how many were taken.
    pub fn write(&mut self, data: &[f32]) -> usize {
        let mut written = 0;
        for &sample in data {
            let next_write = (self.write_pos + 1) % self.capacity;
            if next_write == self.read_pos {
                break;
            }
            self.samples[self.write_pos] = sample;
            self.write_pos = next_write;
            written += 1;
        }
        written
    }

    pub fn read(&mut self) -> Option<f32> {
        if self.read_pos == self.write_pos {
            return None;
        }
        let sample = self.samples[self.read_pos];
        self.read_pos = (self.read_pos + 1) % self.capacity;
        Some(sample)
    }

    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
    }
}

/// A rodio source that plays whatever the reader thread has buffered,
/// padding with silence on underrun.
pub struct StreamingAudioSource {
    buffer: Arc<Mutex<AudioBuffer>>,
    stop_flag: Arc<AtomicBool>,
    sample_rate: u32,
    channels: u16,
}

impl StreamingAudioSource {
    pub fn new(buffer: Arc<Mutex<AudioBuffer>>, stop_flag: Arc<AtomicBool>, sample_rate: u32, channels: u16) -> Self {
        Self { buffer, stop_flag, sample_rate, channels }
    }
}

impl Iterator for StreamingAudioSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stop_flag.load(Ordering::Relaxed) {
            return None;
        }
        match self.buffer.lock() {
            Ok(mut buffer) => buffer.read().or(Some(0.0)),
            Err(_) => Some(0.0),
        }
    }
}

impl Source for StreamingAudioSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}
