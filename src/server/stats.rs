/// Rolling-window aggregation of per-tick counters. The window length is
/// one second's worth of ticks by default, so the averages read as
/// per-second behavior.
#[derive(Debug)]
pub struct StatCollector {
    tick_builder: TickStatBuilder,
    tick_stats: Vec<TickStats>,
    window: usize,
}

impl StatCollector {
    pub fn new(window: usize) -> Self {
        Self {
            tick_builder: TickStatBuilder::default(),
            tick_stats: Vec::with_capacity(window),
            window,
        }
    }

    pub fn tick(&mut self) -> &mut TickStatBuilder {
        &mut self.tick_builder
    }

    pub fn finish_tick(&mut self) {
        self.tick_stats.push(self.tick_builder.tick_stats());
        self.tick_builder.reset();
    }

    pub fn average_if_ready(&self) -> Option<AvgStats> {
        if self.tick_stats.len() < self.window {
            return None;
        }

        let mut avg = AvgStats::default();
        for stats in &self.tick_stats {
            avg.avg_active_players += stats.active_players;
            avg.avg_data_sent_per_player += stats.data_sent_per_player;
            avg.avg_events_sent_per_tick += stats.events_sent;
            avg.avg_events_recv_per_tick += stats.events_received;
            avg.avg_tick_processing_time += stats.processing_time;
            avg.avg_message_size += stats.avg_message_size;
            avg.max_message_size = avg.max_message_size.max(stats.max_message_size);
        }

        let n = self.tick_stats.len() as f64;
        avg.avg_active_players /= n;
        avg.avg_data_sent_per_player /= n;
        avg.avg_events_sent_per_tick /= n;
        avg.avg_events_recv_per_tick /= n;
        avg.avg_tick_processing_time /= n;
        avg.avg_message_size /= n;

        Some(avg)
    }

    pub fn reset_frame(&mut self) {
        self.tick_builder.reset();
        self.tick_stats.clear();
    }
}

#[derive(Debug, Default)]
pub struct TickStatBuilder {
    events_received: usize,
    events_sent: usize,
    total_sent_data_size: usize,
    process_time: f64,
    active_players: usize,
    max_message_size: usize,
}

impl TickStatBuilder {
    pub fn add_events_received(&mut self, count: usize) {
        self.events_received += count;
    }

    pub fn add_events_sent(&mut self, count: usize) {
        self.events_sent += count;
    }

    pub fn add_message_size(&mut self, size: usize) {
        self.total_sent_data_size += size;
        self.max_message_size = self.max_message_size.max(size);
    }

    pub fn add_time(&mut self, seconds: f64) {
        self.process_time += seconds;
    }

    pub fn add_active_players(&mut self, count: usize) {
        self.active_players += count;
    }

    fn tick_stats(&self) -> TickStats {
        TickStats {
            processing_time: self.process_time,
            events_received: self.events_received as f64,
            data_sent_per_player: self.total_sent_data_size as f64
                / self.active_players.max(1) as f64,
            total_data_sent: self.total_sent_data_size as f64,
            avg_message_size: self.total_sent_data_size as f64 / self.events_sent.max(1) as f64,
            events_sent: self.events_sent as f64,
            max_message_size: self.max_message_size as f64,
            active_players: self.active_players as f64,
        }
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TickStats {
    pub events_received: f64,
    pub data_sent_per_player: f64,
    pub avg_message_size: f64,
    pub events_sent: f64,
    pub processing_time: f64,
    pub max_message_size: f64,
    pub total_data_sent: f64,
    pub active_players: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AvgStats {
    pub avg_data_sent_per_player: f64,
    pub avg_events_sent_per_tick: f64,
    pub avg_events_recv_per_tick: f64,
    pub avg_tick_processing_time: f64,
    pub avg_active_players: f64,
    pub max_message_size: f64,
    pub avg_message_size: f64,
}
