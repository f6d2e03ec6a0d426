/// Process-local request id source: never yields 0, wraps past `u32::MAX`.
#[derive(Debug)]
pub struct ReqIdGenerator {
    next: u32,
}

impl ReqIdGenerator {
    pub fn new(seed: u32) -> Self {
        Self { next: seed.max(1) }
    }

    pub fn next_id(&mut self) -> u32 {
        let id = self.next;
        self.next = match self.next.wrapping_add(1) {
            0 => 1,
            n => n,
        };
        id
    }

    /// Next id for which `taken` is false.
    pub fn next_free(&mut self, taken: impl Fn(u32) -> bool) -> u32 {
        loop {
            let id = self.next_id();
            if !taken(id) {
                return id;
            }
        }
    }
}
