use std::ops::Range;

use super::view::MemoryView;
use super::{Address, WORD_SIZE};
use crate::tag::Tag;
use crate::{ErrorKind, Result};

/// タグの内容のみからブロック間を移動するための構造体.
///
/// `p`は常にブロックのペイロード先頭を指すアドレス.
///
/// ```text
///          header(p)   p                      footer(p)  next_block(p)
///              |       |                          |       |
///  ... | F'  | H       | payload ...              | F  | H"  | ...
///      ^
///      prev_footer(p)
/// ```
///
/// - `header(p) = p - Tag::SIZE`
/// - `footer(p) = next_block(p) - WORD_SIZE`
/// - `next_block(p) = p + size(p) * WORD_SIZE`
/// - `prev_footer(p) = p - WORD_SIZE`
/// - `prev_block(p) = p - size(prev_footer(p)) * WORD_SIZE`
///
/// 計算されたオフセットは、参照前に必ずアリーナの範囲内かどうかが検査される.
#[derive(Debug)]
pub(crate) struct Navigator<B> {
    memory: MemoryView<B>,
}
impl<B> Navigator<B>
where
    B: AsRef<[u8]>,
{
    pub fn new(bytes: B) -> Self {
        Navigator {
            memory: MemoryView::new(bytes),
        }
    }

    /// ナビゲート対象のメモリのサイズ.
    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn header(&self, p: Address) -> Result<usize> {
        let offset = track_assert_some!(
            p.as_usize().checked_sub(Tag::SIZE),
            ErrorKind::InconsistentState
        );
        Ok(offset)
    }

    pub fn footer(&self, p: Address) -> Result<usize> {
        let next = track!(self.next_block(p))?;
        Ok(next.as_usize() - WORD_SIZE)
    }

    pub fn prev_footer(&self, p: Address) -> Result<usize> {
        let offset = track_assert_some!(
            p.as_usize().checked_sub(WORD_SIZE),
            ErrorKind::InconsistentState
        );
        Ok(offset)
    }

    /// `p`のヘッダタグを返す.
    pub fn tag(&self, p: Address) -> Result<Tag> {
        let header = track!(self.header(p))?;
        track!(self.memory.read_tag(header))
    }

    /// `p`のフッタタグを返す.
    pub fn footer_tag(&self, p: Address) -> Result<Tag> {
        let footer = track!(self.footer(p))?;
        track!(self.memory.read_tag(footer))
    }

    /// `p`の直前のブロック(ないし開始番兵)のフッタタグを返す.
    pub fn prev_tag(&self, p: Address) -> Result<Tag> {
        let prev_footer = track!(self.prev_footer(p))?;
        track!(self.memory.read_tag(prev_footer))
    }

    pub fn size_words(&self, p: Address) -> Result<u32> {
        Ok(track!(self.tag(p))?.size_words())
    }

    pub fn is_allocated(&self, p: Address) -> Result<bool> {
        Ok(track!(self.tag(p))?.is_allocated())
    }

    pub fn next_block(&self, p: Address) -> Result<Address> {
        let size = track!(self.size_words(p))?;
        track!(self.offset_by_words(p, size, true))
    }

    pub fn prev_block(&self, p: Address) -> Result<Address> {
        let size = track!(self.prev_tag(p))?.size_words();
        track!(self.offset_by_words(p, size, false))
    }

    /// ブロックのペイロードのバイト数を返す.
    pub fn payload_len(&self, p: Address) -> Result<usize> {
        let size = track!(self.size_words(p))? as usize;
        track_assert!(size != 0, ErrorKind::InconsistentState; p);
        Ok(size * WORD_SIZE - WORD_SIZE)
    }

    /// ブロックのペイロード領域の範囲を返す.
    pub fn payload_range(&self, p: Address) -> Result<Range<usize>> {
        let len = track!(self.payload_len(p))?;
        let start = p.as_usize();
        track_assert!(
            start + len <= self.len(),
            ErrorKind::InconsistentState; p, len
        );
        Ok(start..start + len)
    }

    fn offset_by_words(&self, p: Address, size_words: u32, forward: bool) -> Result<Address> {
        let delta = size_words as usize * WORD_SIZE;
        let offset = if forward {
            p.as_usize().checked_add(delta)
        } else {
            p.as_usize().checked_sub(delta)
        };
        let offset = track_assert_some!(offset, ErrorKind::InconsistentState);

        // 終端番兵のペイロード位置(== メモリ長)までは許容する
        track_assert!(
            offset <= self.len(),
            ErrorKind::InconsistentState; p, size_words, offset
        );
        Ok(Address::from(offset as u32))
    }
}
impl<B> Navigator<B>
where
    B: AsRef<[u8]> + AsMut<[u8]>,
{
    /// `p`をペイロード先頭とするブロックのヘッダとフッタを、同時に書き換える.
    ///
    /// 両方の書き込み位置が範囲内であることを確認してから書き込むので、
    /// 片方のタグだけが更新されることはない.
    pub fn set_block(&mut self, p: Address, size_words: u32, allocated: bool) -> Result<()> {
        track_assert!(size_words != 0, ErrorKind::InconsistentState; p);
        let tag = Tag::new(size_words, allocated);
        let header = track!(self.header(p))?;
        let next = track!(self.offset_by_words(p, size_words, true))?;
        let footer = next.as_usize() - WORD_SIZE;

        track!(self.memory.write_tag(header, tag))?;
        track!(self.memory.write_tag(footer, tag))?;
        Ok(())
    }

    /// `p`の位置に終端番兵(ヘッダのみ)を書き込む.
    pub fn set_end_sentinel(&mut self, p: Address) -> Result<()> {
        let header = track!(self.header(p))?;
        track!(self.memory.write_tag(header, Tag::SENTINEL))
    }

    /// ヒープベース`base`の直前に開始番兵(フッタのみ)を書き込む.
    pub fn set_begin_sentinel(&mut self, base: Address) -> Result<()> {
        let prev_footer = track!(self.prev_footer(base))?;
        track!(self.memory.write_tag(prev_footer, Tag::SENTINEL))
    }

    /// `src`のペイロード先頭`len`バイトを`dst`のペイロードにコピーする.
    pub fn copy_payload(&mut self, src: Address, dst: Address, len: usize) -> Result<()> {
        track!(self
            .memory
            .copy_within(src.as_usize(), dst.as_usize(), len))
    }
}

#[cfg(test)]
mod tests {
    use trackable::result::TestResult;

    use super::*;
    use crate::ErrorKind;

    // 各行が1ダブルワード
    fn guide_heap() -> Vec<u8> {
        let tags: [u32; 16] = [
            0, 0, 1, 4 | 1, //
            0, 0, 0, 0, //
            0, 0, 4 | 1, 2, //
            0, 0, 2, 1,
        ];
        let mut bytes = vec![0; 64];
        for (i, t) in tags.iter().enumerate() {
            Tag::from_u32(*t).write_to(&mut bytes[i * 4..]);
        }
        bytes
    }

    #[test]
    fn address_arithmetic_works() -> TestResult {
        let heap = guide_heap();
        let nav = Navigator::new(&heap[..]);
        let base = Address::from(16);

        assert_eq!(track!(nav.header(base))?, 12);
        assert_eq!(track!(nav.footer(base))?, 40);
        assert_eq!(track!(nav.next_block(base))?, Address::from(48));
        assert_eq!(track!(nav.prev_footer(base))?, 8);
        assert_eq!(track!(nav.header(Address::from(48)))?, 44);

        let two_word_block = track!(nav.next_block(base))?;
        assert_eq!(track!(nav.prev_block(two_word_block))?, base);

        assert!(track!(nav.is_allocated(base))?);
        assert_eq!(track!(nav.size_words(base))?, 4);
        assert_eq!(track!(nav.payload_len(base))?, 24);
        assert_eq!(track!(nav.payload_range(base))?, 16..40);
        assert_eq!(track!(nav.footer_tag(base))?, track!(nav.tag(base))?);
        Ok(())
    }

    #[test]
    fn traversal_stops_at_end_sentinel() -> TestResult {
        let heap = guide_heap();
        let nav = Navigator::new(&heap[..]);

        let mut blocks = Vec::new();
        let mut p = Address::from(16);
        while track!(nav.size_words(p))? != 0 {
            blocks.push((p.as_u32(), track!(nav.tag(p))?));
            p = track!(nav.next_block(p))?;
        }
        assert_eq!(
            blocks,
            vec![(16, Tag::new(4, true)), (48, Tag::new(2, false))]
        );
        assert_eq!(p, Address::from(64));
        assert!(track!(nav.prev_tag(Address::from(16)))?.is_sentinel());
        Ok(())
    }

    #[test]
    fn set_block_writes_header_and_footer() -> TestResult {
        let mut heap = guide_heap();
        let mut nav = Navigator::new(&mut heap[..]);
        let base = Address::from(16);

        track!(nav.set_block(base, 6, false))?;
        assert_eq!(track!(nav.tag(base))?, Tag::new(6, false));
        assert_eq!(track!(nav.footer_tag(base))?, Tag::new(6, false));
        assert!(track!(nav.tag(Address::from(64)))?.is_sentinel());
        Ok(())
    }

    #[test]
    fn corrupted_size_is_detected() -> TestResult {
        let mut heap = guide_heap();
        let mut nav = Navigator::new(&mut heap[..]);
        let base = Address::from(16);

        let kind = nav.set_block(base, 8, false).err().map(|e| *e.kind());
        assert_eq!(kind, Some(ErrorKind::InconsistentState));
        assert_eq!(track!(nav.tag(base))?, Tag::new(4, true));

        Tag::new(100, false).write_to(&mut heap[12..]);
        let nav = Navigator::new(&heap[..]);
        let kind = nav.next_block(base).err().map(|e| *e.kind());
        assert_eq!(kind, Some(ErrorKind::InconsistentState));
        Ok(())
    }
}
