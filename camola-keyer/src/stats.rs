use std::time::Duration;

/// Number of presented frames between stats log lines
const LOG_INTERVAL: u64 = 30;

/// Per-stage timing accumulated over the life of the render loop
#[derive(Debug, Default)]
pub struct PipelineStats {
    presented: u64,
    processed: u64,
    throttled: u64,
    degraded: u64,
    total_capture_time: Duration,
    total_mask_time: Duration,
    total_composite_time: Duration,
    total_output_time: Duration,
}

impl PipelineStats {
    pub fn record_capture(&mut self, elapsed: Duration) {
        self.total_capture_time += elapsed;
    }

    pub fn record_mask(&mut self, elapsed: Duration) {
        self.total_mask_time += elapsed;
    }

    pub fn record_composite(&mut self, elapsed: Duration) {
        self.total_composite_time += elapsed;
    }

    pub fn record_output(&mut self, elapsed: Duration) {
        self.total_output_time += elapsed;
    }

    pub fn count_processed(&mut self) {
        self.processed += 1;
    }

    pub fn count_throttled(&mut self) {
        self.throttled += 1;
    }

    pub fn count_degraded(&mut self) {
        self.degraded += 1;
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }

    /// Count a presented frame, logging averages every `LOG_INTERVAL` frames
    pub fn frame_presented(&mut self) {
        self.presented += 1;
        if self.presented % LOG_INTERVAL == 0 {
            self.log();
        }
    }

    /// Mask and composite time only accrue on ticks that were not throttled
    fn processing_ticks(&self) -> u64 {
        self.processed + self.degraded
    }

    fn log(&self) {
        let avg_capture_ms = average_ms(self.total_capture_time, self.presented);
        let avg_mask_ms = average_ms(self.total_mask_time, self.processing_ticks());
        let avg_composite_ms = average_ms(self.total_composite_time, self.processing_ticks());
        let avg_output_ms = average_ms(self.total_output_time, self.presented);
        let total_ms = avg_capture_ms + avg_mask_ms + avg_composite_ms + avg_output_ms;
        let actual_fps = if total_ms > 0.0 { 1000.0 / total_ms } else { 0.0 };

        tracing::info!(
            "Frame {}: capture={:.1}ms, mask={:.1}ms, composite={:.1}ms, output={:.1}ms, total={:.1}ms, fps={:.1} (processed={}, throttled={}, degraded={})",
            self.presented,
            avg_capture_ms,
            avg_mask_ms,
            avg_composite_ms,
            avg_output_ms,
            total_ms,
            actual_fps,
            self.processed,
            self.throttled,
            self.degraded
        );
    }
}

fn average_ms(total: Duration, count: u64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    total.as_secs_f64() * 1000.0 / count as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_over_presented_frames() {
        let mut stats = PipelineStats::default();
        stats.record_capture(Duration::from_millis(10));
        stats.record_capture(Duration::from_millis(20));
        stats.frame_presented();
        stats.frame_presented();

        assert_eq!(stats.presented(), 2);
        assert!((average_ms(stats.total_capture_time, stats.presented) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn mask_time_averages_over_processed_ticks() {
        let mut stats = PipelineStats::default();
        // skip 2: one processed tick out of three presented
        stats.record_mask(Duration::from_millis(30));
        stats.count_processed();
        stats.count_throttled();
        stats.count_throttled();
        for _ in 0..3 {
            stats.frame_presented();
        }

        assert_eq!(stats.processing_ticks(), 1);
        assert!((average_ms(stats.total_mask_time, stats.processing_ticks()) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn empty_stats_average_to_zero() {
        let stats = PipelineStats::default();
        assert_eq!(average_ms(Duration::from_secs(1), stats.presented), 0.0);
    }
}
