use serde::{Deserialize, Serialize};

/// # Summary
/// 固定容量的滚动环形缓冲区，保存最近 N 个数据点。
///
/// # Invariants
/// - 内存空间在初始化时一次性分配，后续不再扩容。
/// - `to_vec` 的输出始终保持插入顺序。
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RollingBuffer<T> {
    // 内部存储容器
    data: Vec<T>,
    // 最大容量
    capacity: usize,
    // 当前插入位置索引
    cursor: usize,
}

impl<T: Clone> RollingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            cursor: 0,
        }
    }

    /// # Summary
    /// 向缓冲区推送新元素。
    ///
    /// # Logic
    /// 1. 若未满，直接 push。
    /// 2. 若已满，根据 cursor 覆盖最旧数据，并递增（取模）cursor。
    pub fn push(&mut self, item: T) {
        if self.data.len() < self.capacity {
            self.data.push(item);
        } else {
            self.data[self.cursor] = item;
            self.cursor = (self.cursor + 1) % self.capacity;
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// # Summary
    /// 获取最新插入的元素。
    ///
    /// # Logic
    /// 1. 未满时返回 Vec 的最后一个。
    /// 2. 已满时返回 cursor 前一个位置的元素。
    pub fn last(&self) -> Option<T> {
        if self.data.is_empty() {
            return None;
        }
        if self.data.len() < self.capacity {
            self.data.last().cloned()
        } else {
            let last_idx = if self.cursor == 0 {
                self.capacity - 1
            } else {
                self.cursor - 1
            };
            self.data.get(last_idx).cloned()
        }
    }

    /// # Summary
    /// 获取按插入顺序排列的完整数据列表。
    ///
    /// # Logic
    /// 1. 未满时直接克隆整个 Vec。
    /// 2. 已满时通过 cursor 切割并重组两段数据，保证输出有序。
    pub fn to_vec(&self) -> Vec<T> {
        if self.data.len() < self.capacity {
            self.data.clone()
        } else {
            let mut result = Vec::with_capacity(self.capacity);
            result.extend(self.data[self.cursor..].iter().cloned());
            result.extend(self.data[..self.cursor].iter().cloned());
            result
        }
    }
}
