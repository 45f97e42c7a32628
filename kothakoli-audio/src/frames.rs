/// Samples per capture frame sent to the live session.
pub const CAPTURE_FRAME_SAMPLES: usize = 4096;

/// Re-blocks arbitrary device callback sizes into fixed-size frames.
#[derive(Debug, Clone)]
pub struct FrameChunker {
    frame_len: usize,
    pending: Vec<f32>,
}

impl Default for FrameChunker {
    fn default() -> Self {
        Self::new(CAPTURE_FRAME_SAMPLES)
    }
}

impl FrameChunker {
    pub fn new(frame_len: usize) -> Self {
        let frame_len = frame_len.max(1);
        Self {
            frame_len,
            pending: Vec::with_capacity(frame_len),
        }
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Appends samples and returns every frame that is now complete.
    pub fn push(&mut self, samples: &[f32]) -> Vec<Vec<f32>> {
        let mut out = Vec::new();
        let mut rest = samples;
        while !rest.is_empty() {
            let want = self.frame_len - self.pending.len();
            let take = want.min(rest.len());
            self.pending.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.pending.len() == self.frame_len {
                out.push(std::mem::replace(
                    &mut self.pending,
                    Vec::with_capacity(self.frame_len),
                ));
            }
        }
        out
    }

    /// Drops the partial tail, e.g. when capture stops.
    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_only_full_frames() {
        let mut c = FrameChunker::new(4);
        assert!(c.push(&[0.0; 3]).is_empty());
        let frames = c.push(&[1.0; 6]);
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.len() == 4));
        assert_eq!(frames[0], vec![0.0, 0.0, 0.0, 1.0]);
        assert_eq!(c.pending_len(), 1);
    }

    #[test]
    fn default_frame_is_4096() {
        let mut c = FrameChunker::default();
        assert_eq!(c.frame_len(), 4096);
        let frames = c.push(&vec![0.0; 4096 * 2 + 10]);
        assert_eq!(frames.len(), 2);
        c.reset();
        assert_eq!(c.pending_len(), 0);
    }
}
