/*
 Copyright (c) 2023 clone206

 This file is part of srdoubler

 srdoubler is free software: you can redistribute it and/or modify it
 under the terms of the GNU General Public License as published by the
 Free Software Foundation, either version 3 of the License, or
 (at your option) any later version.

 srdoubler is distributed in the hope that it will be useful, but
 WITHOUT ANY WARRANTY; without even the implied warranty of
 MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 GNU General Public License for more details.
 You should have received a copy of the GNU General Public License
 along with srdoubler. If not, see <https://www.gnu.org/licenses/>.
*/

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use hound::{SampleFormat, WavReader};
use log::debug;

use crate::dither::Dither;
use crate::model::{DoublerError, DoublerResult};

const WAVE_FORMAT_PCM: u16 = 1;
const WAVE_FORMAT_IEEE_FLOAT: u16 = 3;

/// Bytes of RIFF header counted by the outer chunk size besides the data.
const WAVE_HEADER_TAIL: u32 = 36;

/// Frames encoded per write call; keeps the byte buffer cache friendly.
const FRAME_BLOCK: usize = 16_384;

pub const MAX_CHANNELS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFileFormat {
    Wave,
    Flac,
}

impl AudioFileFormat {
    /// Guess the container from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_ascii_lowercase();
        match ext.to_str()? {
            "wav" | "wave" => Some(AudioFileFormat::Wave),
            "flac" => Some(AudioFileFormat::Flac),
            _ => None,
        }
    }

    /// Parse the single-letter command line form: W or F.
    pub fn from_flag(flag: char) -> DoublerResult<Self> {
        match flag.to_ascii_lowercase() {
            'w' => Ok(AudioFileFormat::Wave),
            'f' => Ok(AudioFileFormat::Flac),
            _ => Err(DoublerError::InvalidParameter(
                "Invalid output type; must be W (wave) or F (flac)".to_string(),
            )),
        }
    }
}

/// Result of encoding samples to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteStats {
    pub frames: usize,
    /// Samples that exceeded full scale and were clamped.
    pub clipped: usize,
}

/// Interleaved audio held in memory as `f64`, full scale = 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFile {
    samples: Vec<f64>,
    sample_rate: u32,
    bit_depth: u16,
    num_channels: usize,
}

impl AudioFile {
    pub fn from_interleaved(
        samples: Vec<f64>,
        num_channels: usize,
        sample_rate: u32,
    ) -> DoublerResult<Self> {
        if num_channels == 0 || num_channels > MAX_CHANNELS {
            return Err(DoublerError::ChannelMismatch {
                expected: MAX_CHANNELS,
                found: num_channels,
            });
        }
        if samples.len() % num_channels != 0 {
            return Err(DoublerError::Format(format!(
                "{} samples do not divide into {} channels",
                samples.len(),
                num_channels
            )));
        }
        Ok(Self {
            samples,
            sample_rate,
            bit_depth: 64,
            num_channels,
        })
    }

    /// Read a RIFF/WAVE file: 8/16/24/32-bit PCM or 32-bit float.
    pub fn load<P: AsRef<Path>>(path: P) -> DoublerResult<Self> {
        let file = Self::read_wave(BufReader::new(File::open(path.as_ref())?))?;
        debug!(
            "Loaded {}: {} Hz, {} bit, {} channel(s), {} frames",
            path.as_ref().display(),
            file.sample_rate,
            file.bit_depth,
            file.num_channels,
            file.num_frames()
        );
        Ok(file)
    }

    fn read_wave<R: io::Read>(reader: R) -> DoublerResult<Self> {
        let reader = WavReader::new(reader)?;
        let spec = reader.spec();
        let num_channels = usize::from(spec.channels);
        if num_channels == 0 || num_channels > MAX_CHANNELS {
            return Err(DoublerError::ChannelMismatch {
                expected: MAX_CHANNELS,
                found: num_channels,
            });
        }

        let samples = match spec.sample_format {
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .map(|s| s.map(f64::from))
                .collect::<Result<Vec<f64>, hound::Error>>()?,
            SampleFormat::Int => {
                let scale = 2.0f64.powi(i32::from(spec.bits_per_sample) - 1);
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| f64::from(v) / scale))
                    .collect::<Result<Vec<f64>, hound::Error>>()?
            }
        };

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
            bit_depth: spec.bits_per_sample,
            num_channels,
        })
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Bit depth of the source file; 64 for buffers built in memory.
    pub fn bit_depth(&self) -> u16 {
        self.bit_depth
    }

    pub fn num_frames(&self) -> usize {
        self.samples.len() / self.num_channels
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f64> {
        self.samples
    }

    /// Encode to `path`. `bits` is 16 or 24 (integer, dithered) or 32
    /// (IEEE float, WAV only).
    ///
    /// A WAV holding no frames is written as a bare header. FLAC output of
    /// an empty buffer is refused with [`DoublerError::Format`], since the
    /// encoder has no block to emit.
    pub fn save<P: AsRef<Path>>(
        &self,
        path: P,
        format: AudioFileFormat,
        bits: u16,
        dither: &mut Dither,
    ) -> DoublerResult<WriteStats> {
        let stats = match format {
            AudioFileFormat::Wave => self.save_wave_file(path.as_ref(), bits, dither)?,
            AudioFileFormat::Flac => self.save_flac_file(path.as_ref(), bits, dither)?,
        };
        debug!(
            "Saved {}: {} Hz, {} bit, {} channel(s), {} frames",
            path.as_ref().display(),
            self.sample_rate,
            bits,
            self.num_channels,
            stats.frames
        );
        Ok(stats)
    }

    /// Scale to `bits`-bit integers with dither, clamping at full scale.
    fn quantize(&self, bits: u16, dither: &mut Dither) -> (Vec<i32>, usize) {
        let scale = 2.0f64.powi(i32::from(bits) - 1);
        let peak_level = scale - 1.0;
        let mut clipped = 0usize;

        let ints = self
            .samples
            .iter()
            .map(|&s| {
                let mut v = s * scale;
                dither.process_samp(&mut v);
                let v = v.round();
                if v > peak_level {
                    clipped += 1;
                    peak_level as i32
                } else if v < -scale {
                    clipped += 1;
                    -scale as i32
                } else {
                    v as i32
                }
            })
            .collect();
        (ints, clipped)
    }

    fn save_wave_file(&self, path: &Path, bits: u16, dither: &mut Dither) -> DoublerResult<WriteStats> {
        if ![16, 24, 32].contains(&bits) {
            return Err(DoublerError::InvalidParameter(format!(
                "Unsupported WAV bit depth: {}",
                bits
            )));
        }

        let is_float = bits == 32;
        let channels = self.num_channels as u16;
        let bytes_per_sample = bits / 8;
        let block_align = channels * bytes_per_sample;
        let frames = self.num_frames();
        let (data_size, file_size) = wave_chunk_sizes(self.samples.len(), bytes_per_sample)?;

        let file = File::create(path)?;
        // 1 MiB buffered writer
        let mut w = BufWriter::with_capacity(1 << 20, file);

        // RIFF header
        w.write_all(b"RIFF")?;
        w.write_all(&file_size.to_le_bytes())?;
        w.write_all(b"WAVE")?;

        // fmt chunk
        w.write_all(b"fmt ")?;
        w.write_all(&16u32.to_le_bytes())?;
        let format_tag = if is_float { WAVE_FORMAT_IEEE_FLOAT } else { WAVE_FORMAT_PCM };
        w.write_all(&format_tag.to_le_bytes())?;
        w.write_all(&channels.to_le_bytes())?;
        w.write_all(&self.sample_rate.to_le_bytes())?;
        let byte_rate = self.sample_rate * u32::from(block_align);
        w.write_all(&byte_rate.to_le_bytes())?;
        w.write_all(&block_align.to_le_bytes())?;
        w.write_all(&bits.to_le_bytes())?;

        // data chunk
        w.write_all(b"data")?;
        w.write_all(&data_size.to_le_bytes())?;

        let block_samples = FRAME_BLOCK * self.num_channels;
        let mut buf: Vec<u8> = Vec::with_capacity(block_samples * bytes_per_sample as usize);
        let mut clipped = 0;

        if is_float {
            for block in self.samples.chunks(block_samples) {
                buf.clear();
                for &s in block {
                    buf.extend_from_slice(&(s as f32).to_le_bytes());
                }
                w.write_all(&buf)?;
            }
        } else {
            let (ints, clips) = self.quantize(bits, dither);
            clipped = clips;
            for block in ints.chunks(block_samples) {
                buf.clear();
                for &v in block {
                    push_int_le(&mut buf, v, bits);
                }
                w.write_all(&buf)?;
            }
        }

        w.flush()?;
        Ok(WriteStats { frames, clipped })
    }

    fn save_flac_file(&self, path: &Path, bits: u16, dither: &mut Dither) -> DoublerResult<WriteStats> {
        use flac_codec::byteorder::LittleEndian;
        use flac_codec::encode::{FlacByteWriter, Options};

        if bits != 16 && bits != 24 {
            return Err(DoublerError::InvalidParameter(
                "FLAC: only 16 or 24-bit supported".to_string(),
            ));
        }
        let frames = self.num_frames();
        if frames == 0 {
            return Err(DoublerError::Format("FLAC: no samples to encode".to_string()));
        }

        let bytes_per_sample = (bits / 8) as usize;
        let total_pcm_bytes = (self.samples.len() * bytes_per_sample) as u64;
        let channels = self.num_channels as u32;

        // LittleEndian because we feed little-endian sample bytes
        let mut flac: FlacByteWriter<_, LittleEndian> = FlacByteWriter::create(
            path,
            Options::default(),
            self.sample_rate,
            u32::from(bits),
            channels.try_into().map_err(|_| DoublerError::ChannelMismatch {
                expected: MAX_CHANNELS,
                found: self.num_channels,
            })?,
            Some(total_pcm_bytes),
        )
        .map_err(|e| io::Error::other(format!("FLAC create: {e}")))?;

        let (ints, clipped) = self.quantize(bits, dither);
        let block_samples = FRAME_BLOCK * self.num_channels;
        let mut buf: Vec<u8> = Vec::with_capacity(block_samples * bytes_per_sample);
        for block in ints.chunks(block_samples) {
            buf.clear();
            for &v in block {
                push_int_le(&mut buf, v, bits);
            }
            flac.write_all(&buf)?;
        }

        flac.finalize()
            .map_err(|e| io::Error::other(format!("FLAC finalize: {e}")))?;
        Ok(WriteStats { frames, clipped })
    }
}

/// RIFF `data` and outer chunk sizes for `num_samples` samples. Both must
/// fit the 32-bit size fields.
fn wave_chunk_sizes(num_samples: usize, bytes_per_sample: u16) -> DoublerResult<(u32, u32)> {
    let too_large = || {
        DoublerError::Format(format!(
            "{} samples of {} bytes exceed the 4 GiB WAV size limit",
            num_samples, bytes_per_sample
        ))
    };
    let data_size = num_samples
        .checked_mul(usize::from(bytes_per_sample))
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(too_large)?;
    let riff_size = data_size
        .checked_add(WAVE_HEADER_TAIL)
        .ok_or_else(too_large)?;
    Ok((data_size, riff_size))
}

fn push_int_le(buf: &mut Vec<u8>, v: i32, bits: u16) {
    match bits {
        16 => buf.extend_from_slice(&(v as i16).to_le_bytes()),
        // little-endian 24-bit (LSB first)
        _ => buf.extend_from_slice(&[
            (v & 0xFF) as u8,
            ((v >> 8) & 0xFF) as u8,
            ((v >> 16) & 0xFF) as u8,
        ]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dither::DitherType;
    use std::io::Cursor;

    fn wave_bytes(format_tag: u16, channels: u16, bits: u16, rate: u32, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(48 + data.len() as u32).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&format_tag.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&rate.to_le_bytes());
        let block_align = channels * bits / 8;
        out.extend_from_slice(&(rate * u32::from(block_align)).to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&bits.to_le_bytes());
        // an unrelated chunk the reader has to skip
        out.extend_from_slice(b"junk");
        out.extend_from_slice(&4u32.to_le_bytes());
        out.extend_from_slice(&[1, 2, 3, 4]);
        out.extend_from_slice(b"data");
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
        out
    }

    fn read(bytes: Vec<u8>) -> DoublerResult<AudioFile> {
        AudioFile::read_wave(Cursor::new(bytes))
    }

    #[test]
    fn reads_16_bit_stereo() {
        let mut data = Vec::new();
        for v in [0i16, 16_384, -32_768, 32_767] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let file = read(wave_bytes(WAVE_FORMAT_PCM, 2, 16, 44_100, &data)).unwrap();
        assert_eq!(file.num_channels(), 2);
        assert_eq!(file.sample_rate(), 44_100);
        assert_eq!(file.bit_depth(), 16);
        assert_eq!(file.num_frames(), 2);
        assert_eq!(file.samples(), &[0.0, 0.5, -1.0, 32_767.0 / 32_768.0]);
    }

    #[test]
    fn reads_24_bit_with_sign_extension() {
        let data = [0x00, 0x00, 0x80, 0xFF, 0xFF, 0x7F];
        let file = read(wave_bytes(WAVE_FORMAT_PCM, 1, 24, 48_000, &data)).unwrap();
        assert_eq!(file.samples(), &[-1.0, 8_388_607.0 / 8_388_608.0]);
    }

    #[test]
    fn reads_unsigned_8_bit() {
        let data = [0u8, 128, 192];
        let file = read(wave_bytes(WAVE_FORMAT_PCM, 1, 8, 8_000, &data)).unwrap();
        assert_eq!(file.samples(), &[-1.0, 0.0, 0.5]);
    }

    #[test]
    fn reads_float_samples() {
        let mut data = Vec::new();
        for v in [0.25f32, -0.75] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let file = read(wave_bytes(WAVE_FORMAT_IEEE_FLOAT, 1, 32, 96_000, &data)).unwrap();
        assert_eq!(file.samples(), &[0.25, -0.75]);
    }

    #[test]
    fn rejects_partial_frames() {
        let data = [0u8, 0, 0, 64, 1, 0];
        assert!(matches!(
            read(wave_bytes(WAVE_FORMAT_PCM, 2, 16, 44_100, &data)),
            Err(DoublerError::Format(_))
        ));
    }

    #[test]
    fn rejects_non_wave_input() {
        assert!(matches!(
            read(b"fLaC\0\0\0\0\0\0\0\0".to_vec()),
            Err(DoublerError::Format(_))
        ));
    }

    #[test]
    fn rejects_unsupported_encoding() {
        // format tag 2 is MS ADPCM
        let bytes = wave_bytes(2, 1, 4, 8_000, &[0, 0]);
        assert!(matches!(read(bytes), Err(DoublerError::Format(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            AudioFile::load(dir.path().join("absent.wav")),
            Err(DoublerError::Io(_))
        ));
    }

    #[test]
    fn chunk_sizes_fit_riff_fields() {
        assert_eq!(wave_chunk_sizes(1_000, 3).unwrap(), (3_000, 3_036));
        assert_eq!(wave_chunk_sizes(0, 4).unwrap(), (0, 36));
    }

    #[test]
    fn oversized_output_is_rejected() {
        // 4 GiB of data does not fit the data chunk size
        assert!(matches!(
            wave_chunk_sizes(1 << 30, 4),
            Err(DoublerError::Format(_))
        ));
        // data fits, but the RIFF size including the header does not
        assert!(matches!(
            wave_chunk_sizes((1 << 30) - 2, 4),
            Err(DoublerError::Format(_))
        ));
        assert!(matches!(
            wave_chunk_sizes(usize::MAX, 2),
            Err(DoublerError::Format(_))
        ));
    }

    #[test]
    fn empty_buffer_writes_header_only_wave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        let file = AudioFile::from_interleaved(Vec::new(), 2, 44_100).unwrap();
        let stats = file
            .save(&path, AudioFileFormat::Wave, 24, &mut Dither::new(DitherType::None))
            .unwrap();
        assert_eq!(stats, WriteStats { frames: 0, clipped: 0 });

        let loaded = AudioFile::load(&path).unwrap();
        assert_eq!(loaded.num_channels(), 2);
        assert_eq!(loaded.num_frames(), 0);
    }

    #[test]
    fn empty_buffer_is_refused_for_flac() {
        let dir = tempfile::tempdir().unwrap();
        let file = AudioFile::from_interleaved(Vec::new(), 1, 44_100).unwrap();
        assert!(matches!(
            file.save(
                dir.path().join("empty.flac"),
                AudioFileFormat::Flac,
                16,
                &mut Dither::new(DitherType::None)
            ),
            Err(DoublerError::Format(_))
        ));
    }

    #[test]
    fn quantize_counts_clipped_samples() {
        let file = AudioFile::from_interleaved(vec![0.5, 1.5, -2.0, -1.0], 1, 44_100).unwrap();
        let mut dither = Dither::new(DitherType::None);
        let (ints, clipped) = file.quantize(16, &mut dither);
        assert_eq!(ints, vec![16_384, 32_767, -32_768, -32_768]);
        assert_eq!(clipped, 2);
    }

    #[test]
    fn format_from_extension_and_flag() {
        assert_eq!(AudioFileFormat::from_path(Path::new("a/b.WAV")), Some(AudioFileFormat::Wave));
        assert_eq!(AudioFileFormat::from_path(Path::new("x.flac")), Some(AudioFileFormat::Flac));
        assert_eq!(AudioFileFormat::from_path(Path::new("x.mp3")), None);
        assert_eq!(AudioFileFormat::from_flag('F').unwrap(), AudioFileFormat::Flac);
        assert!(AudioFileFormat::from_flag('Z').is_err());
    }

    #[test]
    fn from_interleaved_validates_layout() {
        assert!(AudioFile::from_interleaved(vec![0.0; 3], 2, 44_100).is_err());
        assert!(AudioFile::from_interleaved(vec![0.0; 9], 9, 44_100).is_err());
        assert!(AudioFile::from_interleaved(vec![0.0; 4], 2, 44_100).is_ok());
    }
}
