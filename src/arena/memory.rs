use crate::arena::Arena;
use crate::{ErrorKind, Result};

/// `Vec<u8>`をバッファとして使用する`Arena`の実装.
///
/// 拡張の度にバッファが再配置される可能性がある.
#[derive(Debug, Clone)]
pub struct MemoryArena {
    memory: Vec<u8>,
    limit: usize,
}
impl MemoryArena {
    /// 最大で`limit`バイトまで拡張可能な`MemoryArena`インスタンスを生成する.
    ///
    /// ヒープ内のオフセットは32bit幅で表現されるため、`limit`は`u32::MAX`で切り詰められる.
    pub fn new(limit: usize) -> Self {
        MemoryArena {
            memory: Vec::new(),
            limit: std::cmp::min(limit, u32::MAX as usize),
        }
    }

    /// 拡張の上限を持たない(ただし`u32::MAX`バイトまで)`MemoryArena`インスタンスを生成する.
    pub fn unbounded() -> Self {
        Self::new(u32::MAX as usize)
    }
}
impl Arena for MemoryArena {
    fn grow(&mut self, bytes: usize) -> Result<usize> {
        let old_len = self.memory.len();
        let new_len = track_assert_some!(old_len.checked_add(bytes), ErrorKind::ArenaExhausted);
        track_assert!(
            new_len <= self.limit,
            ErrorKind::ArenaExhausted,
            "requested={}, len={}, limit={}",
            bytes,
            old_len,
            self.limit
        );
        self.memory.resize(new_len, 0);
        Ok(old_len)
    }
    fn len(&self) -> usize {
        self.memory.len()
    }
    fn limit(&self) -> usize {
        self.limit
    }
    fn as_bytes(&self) -> &[u8] {
        &self.memory
    }
    fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }
}

#[cfg(test)]
mod tests {
    use trackable::result::TestResult;

    use super::*;
    use crate::ErrorKind;

    #[test]
    fn it_works() -> TestResult {
        let mut arena = MemoryArena::new(64);
        assert!(arena.is_empty());
        assert_eq!(arena.limit(), 64);

        assert_eq!(track!(arena.grow(16))?, 0);
        assert_eq!(track!(arena.grow(32))?, 16);
        assert_eq!(arena.len(), 48);

        arena.as_bytes_mut()[47] = 7;
        assert_eq!(arena.as_bytes()[47], 7);

        assert_eq!(track!(arena.grow(16))?, 48);
        assert_eq!(arena.as_bytes()[47], 7);
        Ok(())
    }

    #[test]
    fn exhausted() -> TestResult {
        let mut arena = MemoryArena::new(32);
        track!(arena.grow(16))?;

        let e = arena.grow(32).err().map(|e| *e.kind());
        assert_eq!(e, Some(ErrorKind::ArenaExhausted));
        assert_eq!(arena.len(), 16);

        assert_eq!(track!(arena.grow(16))?, 16);
        Ok(())
    }

    #[test]
    fn limit_is_truncated() {
        let arena = MemoryArena::new(usize::MAX);
        assert_eq!(arena.limit(), u32::MAX as usize);
    }
}
