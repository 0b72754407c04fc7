use super::navigator::Navigator;
use super::{Address, WORD_SIZE};

/// `Heap::walk`で列挙される、ブロック一つ分の情報.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockInfo {
    /// ブロックのペイロード先頭のアドレス.
    pub address: Address,

    /// ブロックのサイズ(バイト単位、ヘッダおよびフッタ込み).
    pub size: u32,

    /// 割当済みかどうか.
    pub allocated: bool,
}
impl BlockInfo {
    /// ペイロードとして利用可能なバイト数を返す.
    pub fn payload_len(&self) -> u32 {
        self.size - WORD_SIZE as u32
    }
}

/// ヒープ先頭から終端番兵までのブロック群を順に辿るイテレータ.
///
/// 番兵ブロックは列挙されない.
///
/// 壊れたタグ(e.g., 範囲外を指すサイズ)に遭遇した場合には、その時点で列挙を終了する.
/// ヒープが壊れているかどうかを知りたい場合には`Heap::check`を使用すること.
#[derive(Debug)]
pub struct Walk<'a> {
    blocks: Navigator<&'a [u8]>,
    next: Option<Address>,
}
impl<'a> Walk<'a> {
    pub(crate) fn new(bytes: &'a [u8], base: Address) -> Self {
        Walk {
            blocks: Navigator::new(bytes),
            next: Some(base),
        }
    }
}
impl<'a> Iterator for Walk<'a> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<Self::Item> {
        let p = self.next.take()?;
        let tag = self.blocks.tag(p).ok()?;
        if tag.is_sentinel() {
            return None;
        }
        self.next = Some(self.blocks.next_block(p).ok()?);
        Some(BlockInfo {
            address: p,
            size: tag.size_words() * WORD_SIZE as u32,
            allocated: tag.is_allocated(),
        })
    }
}
impl<'a> std::iter::FusedIterator for Walk<'a> {}
