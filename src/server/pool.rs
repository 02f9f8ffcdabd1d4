use crate::api::codec::FlatBuilder;

/// Pool of serialization arenas leased by the tick loop. Grows on demand,
/// never shrinks, and is reset in bulk at tick end so buffers are reused.
#[derive(Debug)]
pub struct BuilderPool {
    builders: Vec<FlatBuilder>,
    is_free: Vec<bool>,
    block_size: usize,
}

impl BuilderPool {
    pub fn new(block_size: usize, count: usize) -> Self {
        Self {
            builders: (0..count).map(|_| FlatBuilder::new(block_size)).collect(),
            is_free: vec![true; count],
            block_size,
        }
    }

    pub fn lease(&mut self) -> &mut FlatBuilder {
        if let Some(index) = self.is_free.iter().position(|free| *free) {
            self.is_free[index] = false;
            return &mut self.builders[index];
        }

        self.builders.push(FlatBuilder::new(self.block_size));
        self.is_free.push(false);
        self.builders
            .last_mut()
            .expect("pool cannot be empty after push")
    }

    pub fn reset_all(&mut self) {
        for (builder, free) in self.builders.iter_mut().zip(self.is_free.iter_mut()) {
            if !*free {
                builder.reset();
                *free = true;
            }
        }
    }

    pub fn arena_count(&self) -> usize {
        self.builders.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_past_initial_capacity() {
        let mut pool = BuilderPool::new(512, 4);

        for _ in 0..5 {
            let _ = pool.lease();
        }

        assert_eq!(pool.arena_count(), 5);
    }

    #[test]
    fn reset_makes_every_arena_leasable_again() {
        let mut pool = BuilderPool::new(512, 2);

        let _ = pool.lease();
        let _ = pool.lease();
        let _ = pool.lease();
        assert_eq!(pool.arena_count(), 3);

        pool.reset_all();
        for _ in 0..3 {
            let _ = pool.lease();
        }
        assert_eq!(pool.arena_count(), 3);
    }
}
