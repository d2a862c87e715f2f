/// Fixed-capacity FIFO ring buffer of trivially-copyable records (spec
/// §4.4). Capacity is chosen once at construction; `is_full`/`is_empty`
/// are tracked as a separate flag pair rather than derived from the
/// indices alone, since read == write is ambiguous between "empty" and
/// "full" once wraparound is in play.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    data: Vec<T>,
    capacity: usize,
    read_index: usize,
    write_index: usize,
    is_full: bool,
}

impl<T: Clone + Default> RingBuffer<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![T::default(); capacity.max(1)],
            capacity: capacity.max(1),
            read_index: 0,
            write_index: 0,
            is_full: false,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.is_full
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.is_full && self.read_index == self.write_index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        if self.is_full {
            self.capacity
        } else if self.write_index >= self.read_index {
            self.write_index - self.read_index
        } else {
            self.capacity - self.read_index + self.write_index
        }
    }

    /// Pushes `value` at the tail. Caller must check [`RingBuffer::is_full`]
    /// first; pushing into a full buffer is a logic error in the caller
    /// (spec §4.4: "Push-back into a full buffer overwrites nothing").
    pub fn push_back(&mut self, value: T) {
        debug_assert!(!self.is_full, "push_back into a full RingBuffer");
        if self.is_full {
            return;
        }
        self.data[self.write_index] = value;
        self.write_index = (self.write_index + 1) % self.capacity;
        if self.write_index == self.read_index {
            self.is_full = true;
        }
    }

    /// Pops the head. Caller must check [`RingBuffer::is_empty`] first.
    pub fn pop_front(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let value = self.data[self.read_index].clone();
        self.read_index = (self.read_index + 1) % self.capacity;
        self.is_full = false;
        Some(value)
    }

    /// Resets indices and flags but retains capacity (spec §4.4).
    pub fn clear_data(&mut self) {
        self.read_index = 0;
        self.write_index = 0;
        self.is_full = false;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_on_construction() {
        let rb: RingBuffer<u32> = RingBuffer::new(3);
        assert!(rb.is_empty());
        assert!(!rb.is_full());
    }

    #[test]
    fn fills_to_capacity_and_reports_full() {
        let mut rb = RingBuffer::new(2);
        rb.push_back(1);
        rb.push_back(2);
        assert!(rb.is_full());
    }

    #[test]
    fn pop_front_is_fifo_across_wraparound() {
        let mut rb = RingBuffer::new(2);
        rb.push_back(1);
        rb.push_back(2);
        assert_eq!(rb.pop_front(), Some(1));
        rb.push_back(3);
        assert_eq!(rb.pop_front(), Some(2));
        assert_eq!(rb.pop_front(), Some(3));
        assert_eq!(rb.pop_front(), None);
    }

    #[test]
    fn clear_data_retains_capacity() {
        let mut rb = RingBuffer::new(2);
        rb.push_back(1);
        rb.push_back(2);
        rb.clear_data();
        assert!(rb.is_empty());
        assert_eq!(rb.capacity(), 2);
        rb.push_back(9);
        assert_eq!(rb.pop_front(), Some(9));
    }
}
