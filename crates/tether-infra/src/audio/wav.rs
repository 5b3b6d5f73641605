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

//! Decodes `.wav` audio into [`SoundData`].

use super::AudioError;
use std::io::Cursor;
use std::path::Path;
use tether_core::audio::SoundData;

/// Decodes an in-memory WAV file.
///
/// Integer PCM is normalized to `[-1.0, 1.0]`; float PCM is passed through.
pub fn load_wav(bytes: &[u8]) -> Result<SoundData, AudioError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max_value = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|s| s as f32 / max_value))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok(SoundData::new(samples, spec.channels, spec.sample_rate))
}

/// Reads and decodes a WAV file from disk.
pub fn load_wav_file(path: impl AsRef<Path>) -> Result<SoundData, AudioError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| AudioError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let sound = load_wav(&bytes)?;
    log::debug!(
        "Loaded '{}': {} frames, {} channels, {} Hz.",
        path.display(),
        sound.frames(),
        sound.channels,
        sound.sample_rate
    );
    Ok(sound)
}

#[cfg(test)]
mod tests {
    use super::*;

    // A WAV file 16-bit, mono, 44100Hz, containing 4 samples (0.1, -0.1, 0.2, -0.2).
    const TEST_WAV_BYTES: &[u8] = &[
        82, 73, 70, 70, 52, 0, 0, 0, 87, 65, 86, 69, 102, 109, 116, 32, 16, 0, 0, 0, 1, 0, 1, 0,
        68, 172, 0, 0, 136, 88, 1, 0, 2, 0, 16, 0, 100, 97, 116, 97, 8, 0, 0, 0, 0, 12, 204, 251,
        51, 13, 205, 243,
    ];

    #[test]
    fn decodes_int_pcm() {
        let sound = load_wav(TEST_WAV_BYTES).expect("valid WAV should decode");

        assert_eq!(sound.sample_rate, 44100);
        assert_eq!(sound.channels, 1);
        assert_eq!(sound.frames(), 4);
        assert!(sound.samples.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn rejects_garbage() {
        let err = load_wav(&[0, 1, 2, 3, 4]).unwrap_err();
        assert!(matches!(err, AudioError::Decode(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_wav_file("/definitely/not/here.wav").unwrap_err();
        match err {
            AudioError::Io { path, .. } => assert!(path.ends_with("here.wav")),
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blip.wav");
        std::fs::write(&path, TEST_WAV_BYTES).unwrap();

        let sound = load_wav_file(&path).unwrap();
        assert_eq!(sound.frames(), 4);
    }
}
