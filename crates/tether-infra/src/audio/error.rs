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

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the concrete audio backends.
#[derive(Debug, Error)]
pub enum AudioError {
    /// The host has no default output device.
    #[error("no default output device available")]
    NoOutputDevice,
    /// The device only offers a sample format the mixer cannot write.
    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),
    /// The bytes are not a readable WAV stream.
    #[error("failed to decode WAV data: {0}")]
    Decode(#[from] hound::Error),
    /// A sound file could not be read.
    #[error("failed to read sound file '{path}': {source}")]
    Io {
        /// The file that failed to load.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
