// Copyright (c) The jestview Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Newline framing for child process output.

use bytes::BytesMut;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::warn;

const CHUNK_SIZE: usize = 4 * 1024;

/// A `BufReader` that remembers when it has hit EOF or an error.
pub(crate) struct FusedBufReader<R> {
    reader: BufReader<R>,
    done: bool,
}

impl<R: AsyncRead + Unpin> FusedBufReader<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            reader: BufReader::with_capacity(CHUNK_SIZE, reader),
            done: false,
        }
    }

    /// Moves whatever is available into `acc`. Cancel-safe.
    pub(crate) async fn fill_buf(&mut self, acc: &mut BytesMut) -> Result<(), io::Error> {
        if self.done {
            return Ok(());
        }

        match self.reader.fill_buf().await {
            Ok(buf) => {
                acc.extend_from_slice(buf);
                if buf.is_empty() {
                    self.done = true;
                }
                let len = buf.len();
                self.reader.consume(len);
                Ok(())
            }
            Err(error) => {
                self.done = true;
                Err(error)
            }
        }
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done
    }
}

/// Yields complete lines from a stream, however the bytes happen to be chunked.
pub(crate) struct LineReader<R> {
    name: &'static str,
    reader: FusedBufReader<R>,
    acc: BytesMut,
    // Bytes at the start of `acc` already known to contain no newline.
    scanned: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub(crate) fn new(name: &'static str, reader: R) -> Self {
        Self {
            name,
            reader: FusedBufReader::new(reader),
            acc: BytesMut::with_capacity(CHUNK_SIZE),
            scanned: 0,
        }
    }

    /// Returns the next line, or `None` at EOF. Cancel-safe.
    ///
    /// A trailing line without a newline is discarded.
    pub(crate) async fn next_line(&mut self) -> Result<Option<String>, io::Error> {
        loop {
            if let Some(line) = take_line(&mut self.acc, &mut self.scanned) {
                return Ok(Some(line));
            }
            if self.reader.is_done() {
                if !self.acc.is_empty() {
                    warn!(
                        "discarding {} bytes of unterminated {} output",
                        self.acc.len(),
                        self.name,
                    );
                    self.acc.clear();
                    self.scanned = 0;
                }
                return Ok(None);
            }
            self.reader.fill_buf(&mut self.acc).await?;
        }
    }
}

/// A version of [`LineReader::next_line`] that works with an `Option<LineReader>`.
pub(crate) async fn next_line_opt<R: AsyncRead + Unpin>(
    reader: Option<&mut LineReader<R>>,
) -> Result<Option<String>, io::Error> {
    match reader {
        Some(reader) => reader.next_line().await,
        None => Ok(None),
    }
}

/// Splits the first complete line off `acc`, dropping the `\n` and any `\r` before it.
///
/// The search starts at `scanned`, which is updated so that a line arriving over many chunks is
/// only scanned once.
fn take_line(acc: &mut BytesMut, scanned: &mut usize) -> Option<String> {
    let Some(offset) = acc[*scanned..].iter().position(|&b| b == b'\n') else {
        *scanned = acc.len();
        return None;
    };
    let newline = *scanned + offset;
    *scanned = 0;
    let line = acc.split_to(newline + 1);
    let mut line = &line[..newline];
    if let [rest @ .., b'\r'] = line {
        line = rest;
    }
    Some(String::from_utf8_lossy(line).into_owned())
}
