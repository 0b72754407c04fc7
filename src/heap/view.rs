use std::ops::Range;

use crate::tag::Tag;
use crate::{ErrorKind, Result};

/// アリーナのバイト列に対する、範囲検査付きのアクセサ.
///
/// 全ての読み書きは、事前にオフセットが範囲内に収まっているかが検査され、
/// 範囲外の場合には`ErrorKind::InconsistentState`のエラーとなる.
/// (範囲外のオフセットは、壊れたタグから計算された場合にしか発生し得ない)
#[derive(Debug)]
pub(crate) struct MemoryView<B> {
    bytes: B,
}
impl<B> MemoryView<B>
where
    B: AsRef<[u8]>,
{
    pub fn new(bytes: B) -> Self {
        MemoryView { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.as_ref().len()
    }

    pub fn read_tag(&self, offset: usize) -> Result<Tag> {
        let range = track!(self.range(offset, Tag::SIZE))?;
        Ok(Tag::read_from(&self.bytes.as_ref()[range]))
    }

    fn range(&self, offset: usize, len: usize) -> Result<Range<usize>> {
        let end = track_assert_some!(offset.checked_add(len), ErrorKind::InconsistentState);
        track_assert!(
            end <= self.len(),
            ErrorKind::InconsistentState,
            "offset={}, len={}, memory_len={}",
            offset,
            len,
            self.len()
        );
        Ok(offset..end)
    }
}
impl<B> MemoryView<B>
where
    B: AsRef<[u8]> + AsMut<[u8]>,
{
    pub fn write_tag(&mut self, offset: usize, tag: Tag) -> Result<()> {
        let range = track!(self.range(offset, Tag::SIZE))?;
        tag.write_to(&mut self.bytes.as_mut()[range]);
        Ok(())
    }

    /// `src`から始まる`len`バイトを`dst`にコピーする (領域が重なっていても構わない).
    pub fn copy_within(&mut self, src: usize, dst: usize, len: usize) -> Result<()> {
        let src = track!(self.range(src, len))?;
        track!(self.range(dst, len))?;
        self.bytes.as_mut().copy_within(src, dst);
        Ok(())
    }
}
