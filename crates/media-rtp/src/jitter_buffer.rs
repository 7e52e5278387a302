use crate::{ExtendedRtpTimestamp, ExtendedSequenceNumber, RtpPacket, Ssrc};
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Tuning knobs for [`JitterBuffer`].
#[derive(Debug, Clone, Copy)]
pub struct JitterBufferConfig {
    /// Target end-to-end delay packets are paced to, on top of their
    /// arrival-relative timestamp offset.
    pub target_delay: Duration,
    /// Maximum number of buffered slots (occupied or vacant) before the
    /// oldest is dropped to admit a new packet.
    pub max_depth: usize,
}

impl Default for JitterBufferConfig {
    fn default() -> Self {
        JitterBufferConfig {
            target_delay: Duration::from_millis(60),
            max_depth: 200,
        }
    }
}

/// Cumulative counters exposed alongside the buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct JitterBufferStats {
    pub received: u64,
    pub reordered: u64,
    pub late_dropped: u64,
    pub overflow_dropped: u64,
    pub duplicate_dropped: u64,
}

enum QueueEntry {
    Vacant(ExtendedSequenceNumber),
    Occupied {
        timestamp: ExtendedRtpTimestamp,
        sequence_number: ExtendedSequenceNumber,
        packet: RtpPacket,
    },
}

impl QueueEntry {
    fn sequence_number(&self) -> ExtendedSequenceNumber {
        match self {
            QueueEntry::Vacant(seq) => *seq,
            QueueEntry::Occupied {
                sequence_number, ..
            } => *sequence_number,
        }
    }
}

/// Reorders and paces received RTP packets within a bounded delay window.
///
/// State is kept per SSRC: a new SSRC (source switch, e.g. after a
/// re-negotiation) resets the buffer and re-seeds the timing origin from its
/// first packet.
pub struct JitterBuffer {
    config: JitterBufferConfig,
    clock_rate: u32,
    ssrc: Option<Ssrc>,
    origin: Option<(Instant, ExtendedRtpTimestamp)>,
    last_sequence_number_returned: Option<ExtendedSequenceNumber>,
    queue: VecDeque<QueueEntry>,
    stats: JitterBufferStats,
}

impl JitterBuffer {
    pub fn new(config: JitterBufferConfig, clock_rate: u32) -> Self {
        JitterBuffer {
            config,
            clock_rate,
            ssrc: None,
            origin: None,
            last_sequence_number_returned: None,
            queue: VecDeque::new(),
            stats: JitterBufferStats::default(),
        }
    }

    pub fn stats(&self) -> JitterBufferStats {
        self.stats
    }

    fn reset(&mut self) {
        self.origin = None;
        self.last_sequence_number_returned = None;
        self.queue.clear();
    }

    pub fn push(
        &mut self,
        now: Instant,
        ssrc: Ssrc,
        sequence_number: ExtendedSequenceNumber,
        timestamp: ExtendedRtpTimestamp,
        packet: RtpPacket,
    ) {
        if self.ssrc != Some(ssrc) {
            self.reset();
            self.ssrc = Some(ssrc);
        }

        self.stats.received += 1;

        if self.origin.is_none() {
            self.origin = Some((now, timestamp));
        }

        if let Some(last) = self.last_sequence_number_returned {
            if sequence_number <= last {
                self.stats.late_dropped += 1;
                return;
            }
        }

        let Some(back) = self.queue.back() else {
            self.queue.push_back(QueueEntry::Occupied {
                timestamp,
                sequence_number,
                packet,
            });
            return;
        };

        match back.sequence_number().cmp(&sequence_number) {
            Ordering::Greater => {
                self.stats.reordered += 1;

                for entry in self.queue.iter_mut().rev() {
                    if entry.sequence_number() == sequence_number {
                        if matches!(entry, QueueEntry::Vacant(..)) {
                            *entry = QueueEntry::Occupied {
                                timestamp,
                                sequence_number,
                                packet,
                            };
                        } else {
                            self.stats.duplicate_dropped += 1;
                        }
                        break;
                    }
                }
            }
            Ordering::Equal => {
                if matches!(back, QueueEntry::Vacant(..)) {
                    *self.queue.back_mut().expect("checked Some above") = QueueEntry::Occupied {
                        timestamp,
                        sequence_number,
                        packet,
                    };
                } else {
                    self.stats.duplicate_dropped += 1;
                }
            }
            Ordering::Less => {
                let back_seq = back.sequence_number();
                let gap = sequence_number.0 - back_seq.0;

                for i in 1..gap {
                    self.queue
                        .push_back(QueueEntry::Vacant(ExtendedSequenceNumber(back_seq.0 + i)));
                }

                self.queue.push_back(QueueEntry::Occupied {
                    timestamp,
                    sequence_number,
                    packet,
                });
            }
        }

        while self.queue.len() > self.config.max_depth {
            self.queue.pop_front();
            self.stats.overflow_dropped += 1;
        }
    }

    /// Emit every packet whose scheduled play-out time has elapsed, in
    /// sequence-number order.
    pub fn pop_ready(&mut self, now: Instant) -> Vec<RtpPacket> {
        let mut ready = Vec::new();

        loop {
            let should_pop = match self.queue.front() {
                None => break,
                Some(QueueEntry::Vacant(_)) => true,
                Some(QueueEntry::Occupied { timestamp, .. }) => {
                    let Some((origin_instant, origin_ts)) = self.origin else {
                        break;
                    };

                    let delta_samples = timestamp.0.saturating_sub(origin_ts.0);
                    let delta =
                        Duration::from_secs_f64(delta_samples as f64 / f64::from(self.clock_rate));

                    origin_instant + self.config.target_delay + delta <= now
                }
            };

            if !should_pop {
                break;
            }

            match self.queue.pop_front() {
                Some(QueueEntry::Vacant(_)) => {}
                Some(QueueEntry::Occupied {
                    sequence_number,
                    packet,
                    ..
                }) => {
                    self.last_sequence_number_returned = Some(sequence_number);
                    ready.push(packet);
                }
                None => unreachable!("front() just confirmed an entry exists"),
            }
        }

        ready
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn packet(seq: u16) -> RtpPacket {
        RtpPacket {
            marker: false,
            pt: 0,
            sequence_number: crate::SequenceNumber(seq),
            ssrc: Ssrc(1),
            timestamp: crate::RtpTimestamp(0),
            payload: Bytes::new(),
        }
    }

    #[test]
    fn reorders_and_emits_in_sequence_order() {
        let mut jb = JitterBuffer::new(JitterBufferConfig::default(), 8000);
        let now = Instant::now();

        jb.push(now, Ssrc(1), ExtendedSequenceNumber(1), ExtendedRtpTimestamp(0), packet(1));
        jb.push(now, Ssrc(1), ExtendedSequenceNumber(3), ExtendedRtpTimestamp(160), packet(3));
        jb.push(now, Ssrc(1), ExtendedSequenceNumber(2), ExtendedRtpTimestamp(80), packet(2));

        assert_eq!(jb.len(), 3);
        assert_eq!(jb.stats().reordered, 1);

        let far_future = now + Duration::from_secs(10);
        let ready: Vec<_> = jb.pop_ready(far_future).into_iter().map(|p| p.sequence_number.0).collect();
        assert_eq!(ready, vec![1, 2, 3]);
    }

    #[test]
    fn overflow_drops_oldest() {
        let config = JitterBufferConfig {
            target_delay: Duration::from_millis(60),
            max_depth: 4,
        };
        let mut jb = JitterBuffer::new(config, 8000);
        let now = Instant::now();

        for seq in 0..5u16 {
            jb.push(
                now,
                Ssrc(1),
                ExtendedSequenceNumber(u64::from(seq)),
                ExtendedRtpTimestamp(u64::from(seq) * 160),
                packet(seq),
            );
        }

        assert_eq!(jb.len(), 4);
        assert_eq!(jb.stats().overflow_dropped, 1);
    }

    #[test]
    fn pacing_withholds_packets_before_play_out_time() {
        let mut jb = JitterBuffer::new(JitterBufferConfig::default(), 8000);
        let now = Instant::now();

        jb.push(now, Ssrc(1), ExtendedSequenceNumber(1), ExtendedRtpTimestamp(0), packet(1));

        assert!(jb.pop_ready(now).is_empty());
        assert_eq!(jb.pop_ready(now + Duration::from_millis(60)).len(), 1);
    }

    #[test]
    fn new_ssrc_resets_state() {
        let mut jb = JitterBuffer::new(JitterBufferConfig::default(), 8000);
        let now = Instant::now();

        jb.push(now, Ssrc(1), ExtendedSequenceNumber(5), ExtendedRtpTimestamp(0), packet(5));
        jb.push(
            now,
            Ssrc(2),
            ExtendedSequenceNumber(1),
            ExtendedRtpTimestamp(0),
            packet(1),
        );

        assert_eq!(jb.len(), 1);
    }
}
