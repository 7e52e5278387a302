use std::time::Instant;

/// Owned snapshot of one [`crate::MediaSession`]'s counters, returned from
/// `statistics()`. Internal state lives behind the session's lock; this is
/// always a copy.
#[derive(Debug, Clone, Copy)]
pub struct Statistics {
    pub audio_packets_sent: u64,
    pub audio_bytes_sent: u64,
    pub audio_packets_received: u64,
    pub audio_bytes_received: u64,
    pub dtmf_events_sent: u64,
    pub dtmf_events_received: u64,
    pub rtcp_reports_sent: u64,
    pub rtcp_reports_received: u64,
    pub packets_malformed: u64,
    pub jitter_late_dropped: u64,
    pub jitter_overflow_dropped: u64,
    pub started_at: Instant,
    pub last_activity: Instant,
}

impl Statistics {
    pub fn new(now: Instant) -> Self {
        Statistics {
            audio_packets_sent: 0,
            audio_bytes_sent: 0,
            audio_packets_received: 0,
            audio_bytes_received: 0,
            dtmf_events_sent: 0,
            dtmf_events_received: 0,
            rtcp_reports_sent: 0,
            rtcp_reports_received: 0,
            packets_malformed: 0,
            jitter_late_dropped: 0,
            jitter_overflow_dropped: 0,
            started_at: now,
            last_activity: now,
        }
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }
}
