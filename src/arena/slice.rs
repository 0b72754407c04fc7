use crate::arena::Arena;
use crate::{ErrorKind, Result};

/// 利用者が用意した固定長のバッファを、先頭から切り出していく`Arena`の実装.
///
/// `MemoryArena`とは異なり、拡張時にバッファが再配置されることはない.
/// 静的領域やスタック上の配列の上でヒープを動かしたい場合に使用する.
#[derive(Debug)]
pub struct SliceArena<'a> {
    buf: &'a mut [u8],
    brk: usize,
}
impl<'a> SliceArena<'a> {
    /// `buf`全体を上限とする`SliceArena`インスタンスを生成する.
    ///
    /// ヒープ内のオフセットは32bit幅で表現されるため、`u32::MAX`バイトを超える部分は使用されない.
    pub fn new(buf: &'a mut [u8]) -> Self {
        let limit = std::cmp::min(buf.len(), u32::MAX as usize);
        SliceArena {
            buf: &mut buf[..limit],
            brk: 0,
        }
    }
}
impl<'a> Arena for SliceArena<'a> {
    fn grow(&mut self, bytes: usize) -> Result<usize> {
        let old_brk = self.brk;
        let new_brk = track_assert_some!(old_brk.checked_add(bytes), ErrorKind::ArenaExhausted);
        track_assert!(
            new_brk <= self.buf.len(),
            ErrorKind::ArenaExhausted,
            "requested={}, brk={}, limit={}",
            bytes,
            old_brk,
            self.buf.len()
        );
        self.brk = new_brk;
        Ok(old_brk)
    }
    fn len(&self) -> usize {
        self.brk
    }
    fn limit(&self) -> usize {
        self.buf.len()
    }
    fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.brk]
    }
    fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf[..self.brk]
    }
}

#[cfg(test)]
mod tests {
    use trackable::result::TestResult;

    use super::*;
    use crate::ErrorKind;

    #[test]
    fn it_works() -> TestResult {
        let mut buf = [0xAAu8; 48];
        {
            let mut arena = SliceArena::new(&mut buf);
            assert_eq!(arena.limit(), 48);
            assert!(arena.as_bytes().is_empty());

            assert_eq!(track!(arena.grow(16))?, 0);
            assert_eq!(arena.as_bytes(), &[0xAA; 16][..]);
            arena.as_bytes_mut()[0] = 1;

            let e = arena.grow(64).err().map(|e| *e.kind());
            assert_eq!(e, Some(ErrorKind::ArenaExhausted));
            assert_eq!(arena.len(), 16);

            assert_eq!(track!(arena.grow(32))?, 16);
            assert_eq!(arena.len(), 48);
        }
        assert_eq!(buf[0], 1);
        Ok(())
    }
}
