//! Common types for Rotor
//!
//! Processing spec, planar audio buffers and the frequency limits shared by
//! the coefficient formula and the spread distributor.

/// Audio sample type (32-bit float throughout the signal path)
pub type Sample = f32;

/// Lowest frequency any stage may be tuned to
///
/// Keeps the all-pass poles away from DC where the coefficient formula
/// degenerates.
pub const MIN_FREQUENCY: f32 = 5.0;

/// Stage frequencies are capped at `sample_rate / NYQUIST_DIVISOR`
pub const NYQUIST_DIVISOR: f32 = 2.1;

/// Maximum number of filter stages per channel
pub const MAX_STAGES: usize = 512;

/// Highest frequency a stage may be tuned to at the given sample rate
#[inline]
pub fn max_frequency(sample_rate: f32) -> f32 {
    sample_rate / NYQUIST_DIVISOR
}

/// Clamp a frequency into the stable range for the given sample rate
#[inline]
pub fn clamp_frequency(frequency: f32, sample_rate: f32) -> f32 {
    // `max` before `min` so a pathological sample rate below 10.5 Hz still
    // yields a finite frequency instead of panicking in `clamp`
    frequency.max(MIN_FREQUENCY).min(max_frequency(sample_rate))
}

/// The audio stream contract agreed on before the first `process` call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessSpec {
    /// Sample rate in Hz
    pub sample_rate: f32,
    /// Largest block the host will ever pass to `process`
    pub max_block_size: usize,
    /// Number of channels on the main bus (input == output)
    pub num_channels: usize,
}

impl ProcessSpec {
    /// Create a new processing spec
    pub fn new(sample_rate: f32, max_block_size: usize, num_channels: usize) -> Self {
        Self {
            sample_rate,
            max_block_size,
            num_channels,
        }
    }

    /// Check the spec is something the engine can run with
    pub fn validate(&self) -> crate::RotorResult<()> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(crate::RotorError::InvalidSpec(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.max_block_size == 0 {
            return Err(crate::RotorError::InvalidSpec(
                "max block size must be at least 1".to_string(),
            ));
        }
        if self.num_channels == 0 {
            return Err(crate::RotorError::InvalidSpec(
                "main bus has no channels".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ProcessSpec {
    fn default() -> Self {
        Self::new(48_000.0, 512, 2)
    }
}

/// Planar multi-channel audio the engine can process in place
///
/// Implemented for [`ChannelBuffer`] and for host-provided channel slices
/// (`[&mut [f32]]`), so hosts never have to copy into an owned buffer.
pub trait AudioChannels {
    /// Number of channels in the buffer, including any beyond the main bus
    fn num_channels(&self) -> usize;

    /// Number of samples per channel
    fn num_samples(&self) -> usize;

    /// Mutable access to one channel's samples
    fn channel_mut(&mut self, channel: usize) -> &mut [Sample];
}

impl<'a> AudioChannels for [&'a mut [Sample]] {
    fn num_channels(&self) -> usize {
        self.len()
    }

    fn num_samples(&self) -> usize {
        self.iter().map(|channel| channel.len()).min().unwrap_or(0)
    }

    fn channel_mut(&mut self, channel: usize) -> &mut [Sample] {
        &mut *self[channel]
    }
}

/// An owned planar buffer, one `Vec` per channel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelBuffer {
    channels: Vec<Vec<Sample>>,
    len: usize,
}

impl ChannelBuffer {
    /// Create a buffer filled with silence
    pub fn silence(num_channels: usize, len: usize) -> Self {
        Self {
            channels: vec![vec![0.0; len]; num_channels],
            len,
        }
    }

    /// Create a buffer from interleaved samples `[c0, c1, .., c0, c1, ..]`
    pub fn from_interleaved(interleaved: &[Sample], num_channels: usize) -> Self {
        assert!(num_channels > 0, "Buffer needs at least one channel");
        assert!(
            interleaved.len() % num_channels == 0,
            "Interleaved length {} is not a multiple of {} channels",
            interleaved.len(),
            num_channels
        );
        let len = interleaved.len() / num_channels;
        let mut buffer = Self::silence(num_channels, len);
        for (frame_idx, frame) in interleaved.chunks_exact(num_channels).enumerate() {
            for (channel, &sample) in frame.iter().enumerate() {
                buffer.channels[channel][frame_idx] = sample;
            }
        }
        buffer
    }

    /// Create a buffer from separate channel vectors
    pub fn from_channels(channels: Vec<Vec<Sample>>) -> Self {
        let len = channels.first().map(Vec::len).unwrap_or(0);
        assert!(
            channels.iter().all(|c| c.len() == len),
            "Channel lengths must match"
        );
        Self { channels, len }
    }

    /// Interleave the channels back into `[c0, c1, .., c0, c1, ..]`
    pub fn to_interleaved(&self) -> Vec<Sample> {
        let mut interleaved = Vec::with_capacity(self.len * self.channels.len());
        for frame_idx in 0..self.len {
            for channel in &self.channels {
                interleaved.push(channel[frame_idx]);
            }
        }
        interleaved
    }

    /// Number of samples per channel
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the buffer holds no samples
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read access to one channel
    pub fn channel(&self, channel: usize) -> &[Sample] {
        &self.channels[channel]
    }

    /// Mutable access to every channel at once
    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut [Sample]> {
        self.channels.iter_mut().map(Vec::as_mut_slice)
    }
}

impl AudioChannels for ChannelBuffer {
    fn num_channels(&self) -> usize {
        self.channels.len()
    }

    fn num_samples(&self) -> usize {
        self.len
    }

    fn channel_mut(&mut self, channel: usize) -> &mut [Sample] {
        &mut self.channels[channel]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleave_roundtrip_layout() {
        let interleaved = [1.0, -1.0, 2.0, -2.0, 3.0, -3.0];
        let buffer = ChannelBuffer::from_interleaved(&interleaved, 2);

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.channel(0), &[1.0, 2.0, 3.0]);
        assert_eq!(buffer.channel(1), &[-1.0, -2.0, -3.0]);
        assert_eq!(buffer.to_interleaved(), interleaved.to_vec());
    }

    #[test]
    fn test_channels_mut_writes_every_channel() {
        let mut buffer = ChannelBuffer::silence(3, 4);
        for (gain, channel) in buffer.channels_mut().enumerate() {
            channel[1..3].fill(gain as f32);
        }
        assert_eq!(buffer.channel(0), &[0.0; 4]);
        assert_eq!(buffer.channel(2), &[0.0, 2.0, 2.0, 0.0]);
    }

    #[test]
    fn test_slice_channels_report_shortest_length() {
        let mut left = [0.0; 8];
        let mut right = [0.0; 6];
        let mut channels: [&mut [Sample]; 2] = [&mut left, &mut right];
        let buffer: &mut [&mut [Sample]] = &mut channels;

        assert_eq!(buffer.num_channels(), 2);
        assert_eq!(buffer.num_samples(), 6);
    }

    #[test]
    fn test_spec_validation() {
        assert!(ProcessSpec::default().validate().is_ok());
        assert!(ProcessSpec::new(0.0, 512, 2).validate().is_err());
        assert!(ProcessSpec::new(48_000.0, 0, 2).validate().is_err());
        assert!(ProcessSpec::new(48_000.0, 512, 0).validate().is_err());
    }

    #[test]
    fn test_frequency_clamp() {
        assert_eq!(clamp_frequency(0.0, 48_000.0), MIN_FREQUENCY);
        assert_eq!(clamp_frequency(1_000.0, 48_000.0), 1_000.0);
        assert!((clamp_frequency(30_000.0, 48_000.0) - 48_000.0 / 2.1).abs() < 1e-3);
    }
}
