use std::{
    io::Read,
    path::{Path, PathBuf},
    process::{Child, ChildStdout, Command, Stdio},
};

use crate::{
    assets::raster::PreparedImage,
    foundation::{
        core::Fps,
        error::{WatermarkError, WatermarkResult},
    },
    timeline::composition::TimeRange,
};

/// Streams one video stream of a source file as opaque RGBA8 frames at a fixed rate.
///
/// Frames come out at their stored (natural) size; display rotation is left to the
/// orientation transform.
pub struct VideoFrameReader {
    path: PathBuf,
    width: u32,
    height: u32,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
}

impl VideoFrameReader {
    #[tracing::instrument(level = "debug", fields(path = %path.display()))]
    pub fn spawn(
        path: &Path,
        stream_index: usize,
        natural: (u32, u32),
        fps: Fps,
        range: TimeRange,
    ) -> WatermarkResult<Self> {
        let (width, height) = natural;
        if width == 0 || height == 0 {
            return Err(WatermarkError::validation(
                "source video has a zero natural size",
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd.args(["-v", "error", "-noautorotate"]);
        if range.start > 0.0 {
            cmd.args(["-ss", &format!("{:.6}", range.start)]);
        }
        cmd.arg("-i")
            .arg(path)
            .args([
                "-map",
                &format!("0:{stream_index}"),
                "-t",
                &format!("{:.6}", range.duration),
                "-r",
                &format!("{}/{}", fps.num, fps.den),
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "pipe:1",
            ]);

        let mut child = cmd.spawn().map_err(|e| {
            WatermarkError::export(format!(
                "failed to spawn ffmpeg decoder (is it installed and on PATH?): {e}"
            ))
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| WatermarkError::export("failed to open ffmpeg stdout (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| WatermarkError::export("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        Ok(Self {
            path: path.to_path_buf(),
            width,
            height,
            child: Some(child),
            stdout: Some(stdout),
            stderr_drain: Some(stderr_drain),
        })
    }

    pub fn natural_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Next decoded frame, or `None` once the stream is exhausted.
    pub fn next_frame(&mut self) -> WatermarkResult<Option<PreparedImage>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let mut buf = vec![0u8; self.width as usize * self.height as usize * 4];
        let mut filled = 0;
        while filled < buf.len() {
            let n = stdout.read(&mut buf[filled..]).map_err(|e| {
                WatermarkError::export(format!("failed to read decoded frame: {e}"))
            })?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            self.stdout = None;
            return Ok(None);
        }
        if filled < buf.len() {
            return Err(WatermarkError::export(format!(
                "truncated frame from '{}': {filled} of {} bytes",
                self.path.display(),
                buf.len()
            )));
        }

        // rawvideo rgba from a video stream is opaque, so straight equals premultiplied.
        PreparedImage::from_premul_rgba8(self.width, self.height, buf).map(Some)
    }

    /// Wait for the decoder and surface its exit status.
    pub fn finish(mut self) -> WatermarkResult<()> {
        drop(self.stdout.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| WatermarkError::export("ffmpeg decoder already finished"))?;
        let status = child.wait().map_err(|e| {
            WatermarkError::export(format!("failed to wait for ffmpeg decoder: {e}"))
        })?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| WatermarkError::export("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| WatermarkError::export(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };

        if !status.success() {
            return Err(WatermarkError::export(format!(
                "ffmpeg decoder exited with status {}: {}",
                status,
                String::from_utf8_lossy(&stderr_bytes).trim()
            )));
        }
        Ok(())
    }
}

impl Iterator for VideoFrameReader {
    type Item = WatermarkResult<PreparedImage>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}

impl Drop for VideoFrameReader {
    fn drop(&mut self) {
        drop(self.stdout.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
