//! 境界タグ方式のヒープ.
//!
//! このモジュール自体は、具体的な記憶領域の確保方法とは切り離されており、
//! 利用の際には、使用する[Arena]実装を指定する必要がある.
//!
//! # ブロックの構造
//!
//! ```text
//!  header                                          footer
//! +------+---------------------------------------+------+------+
//! | tag  | payload (size * WORD_SIZE - WORD_SIZE) | tag  |      |
//! +------+---------------------------------------+------+------+
//!        ^ Address (常にダブルワード境界)                   ^ 次ブロックのヘッダ
//! ```
//!
//! ブロックのサイズ(ワード単位)は、ヘッダ・フッタ・ペイロードを全て含んだ値で、常に偶数.
//! ヘッダとフッタには常に同じタグが書き込まれる.
//!
//! [Arena]: ../arena/trait.Arena.html
use slog::Logger;

pub use self::address::Address;
pub use self::builder::HeapBuilder;
pub use self::walk::{BlockInfo, Walk};

use self::navigator::Navigator;
use crate::arena::Arena;
use crate::metrics::HeapMetrics;
use crate::tag::Tag;
use crate::{ErrorKind, Result};

mod address;
mod builder;
mod navigator;
mod view;
mod walk;

/// ワードのバイト数.
pub const WORD_SIZE: usize = 8;

/// ダブルワード(アライメントの単位)のバイト数.
pub const DWORD_SIZE: usize = 16;

/// ブロックの最小サイズ(ワード単位).
///
/// 空きブロックの分割は、残りがこのサイズ以上となる場合にのみ行われる.
pub const MIN_BLOCK_WORDS: u32 = 2;

/// ブロック群とは別に、番兵のためにアリーナ内で消費されるバイト数.
///
/// 内訳は、先頭のパディング(1ワード)、開始番兵のフッタ、終端番兵のヘッダ.
pub const HEAP_OVERHEAD: usize = DWORD_SIZE;

/// 初期化時に用意される空きブロックのデフォルトサイズ(ワード単位).
pub const DEFAULT_INITIAL_WORDS: u32 = 6;

/// `size`バイトのペイロードを格納するために必要なブロックサイズ(ワード単位)を返す.
///
/// ヘッダとフッタの分を加えた上で、ダブルワード境界に切り上げられる.
///
/// # Examples
///
/// ```
/// use tagalloc::heap::required_words;
///
/// assert_eq!(required_words(1), 2);
/// assert_eq!(required_words(8), 2);
/// assert_eq!(required_words(9), 4);
/// assert_eq!(required_words(22), 4);
/// assert_eq!(required_words(26), 6);
/// ```
pub fn required_words(size: u32) -> u32 {
    let bytes = u64::from(size) + 2 * Tag::SIZE as u64;
    let dword = DWORD_SIZE as u64;
    let aligned = (bytes + dword - 1) / dword * dword;
    (aligned / WORD_SIZE as u64) as u32
}

/// 単一のアリーナを管理する、境界タグ方式のヒープアロケータ.
///
/// 空き領域の探索はヒープ先頭からのファーストフィットで行われ、
/// 解放時には前後の空きブロックとの結合が行われる.
///
/// 全ての操作は、タグの書き換えを完全に終えるか、
/// 何も書き換えずにエラーを返すか、のいずれかとなる.
///
/// # 注意
///
/// 内部で排他制御は一切行っていないので、複数スレッドから利用する場合には、
/// 利用者側で`Mutex`等により直列化する必要がある.
#[derive(Debug)]
pub struct Heap<A>
where
    A: Arena,
{
    arena: A,
    base: Address,
    logger: Logger,
    metrics: HeapMetrics,
    check_consistency: bool,
}
impl<A> Heap<A>
where
    A: Arena,
{
    /// デフォルト設定で、`arena`上に新規にヒープを初期化する.
    pub fn new(arena: A) -> Result<Self> {
        track!(HeapBuilder::new().build(arena))
    }

    pub(crate) fn new_uninit(
        arena: A,
        logger: Logger,
        metrics: HeapMetrics,
        check_consistency: bool,
    ) -> Self {
        Heap {
            arena,
            base: Address::from(DWORD_SIZE as u32),
            logger,
            metrics,
            check_consistency,
        }
    }

    /// 番兵を配置し、`initial_words`分の空きブロックを用意する.
    pub(crate) fn init(&mut self, initial_words: u32) -> Result<()> {
        let bytes = HEAP_OVERHEAD + initial_words as usize * WORD_SIZE;
        let start = track!(self.grow_arena(bytes))?;
        track_assert_eq!(start.as_u32(), 0, ErrorKind::InvalidInput);

        let base = self.base;
        let mut blocks = Navigator::new(self.arena.as_bytes_mut());
        track!(blocks.set_begin_sentinel(base))?;
        let mut end = base;
        if initial_words > 0 {
            track!(blocks.set_block(base, initial_words, false))?;
            end = track!(blocks.next_block(base))?;
        }
        track!(blocks.set_end_sentinel(end))?;

        info!(self.logger, "Heap initialized";
              "granted_bytes" => self.arena.len(), "initial_words" => initial_words);
        Ok(())
    }

    /// `size`バイト以上のペイロードを持つブロックを割り当てる.
    ///
    /// 割当ができなかった場合には`None`が返される.
    /// 失敗理由が必要な場合には`try_alloc`を使用すること.
    pub fn alloc(&mut self, size: u32) -> Option<Address> {
        match self.try_alloc(size) {
            Ok(p) => Some(p),
            Err(e) => {
                if *e.kind() == ErrorKind::InconsistentState {
                    crit!(self.logger, "Heap corruption detected: {}", e);
                }
                None
            }
        }
    }

    /// `size`バイト以上のペイロードを持つブロックを割り当てる.
    ///
    /// ヒープ先頭から順に探索し、最初に見つかった十分な大きさの空きブロックを使用する.
    /// 十分な空きブロックが存在しない場合には、アリーナを拡張してブロックを作る.
    ///
    /// # Errors
    ///
    /// - `size`が`0`の場合には、種類が`ErrorKind::ZeroSizeRequest`のエラーが返される
    /// - アリーナの拡張に失敗した場合には、種類が`ErrorKind::ArenaExhausted`のエラーが返される
    ///
    /// いずれの場合も、ヒープの状態は変化しない.
    pub fn try_alloc(&mut self, size: u32) -> Result<Address> {
        if size == 0 {
            self.metrics.zero_size_requests.increment();
            track_panic!(ErrorKind::ZeroSizeRequest, "size={}", size);
        }

        let words = required_words(size);
        let p = if let Some(p) = track!(self.find_fit(words))? {
            p
        } else {
            track!(self.extend_heap(words))?
        };
        track!(self.place(p, words))?;
        track!(self.after_mutation())?;
        Ok(p)
    }

    /// `alloc`によって割り当てられたブロックを解放する.
    ///
    /// 解放されたブロックは、前後に空きブロックがあれば、それらと結合される.
    ///
    /// # Errors
    ///
    /// `ptr`が割当済みブロックのペイロード先頭を指していない場合(e.g., 二重解放)には、
    /// 種類が`ErrorKind::InvalidFree`のエラーが返される.
    /// この場合、ヒープの状態は変化しない.
    pub fn free(&mut self, ptr: Address) -> Result<()> {
        let size = match self.allocated_block_size(ptr, ErrorKind::InvalidFree) {
            Ok(size) => size,
            Err(e) => {
                self.metrics.invalid_frees.increment();
                warn!(self.logger, "Rejected free: {}", e; "address" => ptr.as_u32());
                return Err(track!(e));
            }
        };

        let mut blocks = Navigator::new(self.arena.as_bytes_mut());
        track!(blocks.set_block(ptr, size, false))?;
        self.metrics
            .count_release(u64::from(size) * WORD_SIZE as u64);
        track!(self.coalesce(ptr))?;
        track!(self.after_mutation())
    }

    /// ブロックのサイズを変更する.
    ///
    /// - `ptr`が`None`の場合は`alloc(size)`と同様に振る舞う
    /// - `size`が`0`の場合は`free(ptr)`と同様に振る舞い、`None`を返す
    ///
    /// それ以外の場合には、まずその場での伸縮を試みる(縮小時、ないし直後のブロックが十分な空きブロックの場合).
    /// それが不可能な場合には、新しいブロックを割り当てて、ペイロードの内容をコピーした上で、
    /// 元のブロックを解放する.
    /// コピーされるのは新旧ペイロードの短い方の長さ分で、それ以降の内容は未定義.
    ///
    /// # Errors
    ///
    /// - `ptr`が割当済みブロックを指していない場合には、種類が`ErrorKind::InvalidFree`のエラーが返される
    /// - アリーナの拡張に失敗した場合には、種類が`ErrorKind::ArenaExhausted`のエラーが返される
    ///
    /// いずれの場合も、元のブロックはそのまま残る.
    pub fn realloc(&mut self, ptr: Option<Address>, size: u32) -> Result<Option<Address>> {
        let ptr = match ptr {
            None => {
                return match self.try_alloc(size) {
                    Ok(p) => Ok(Some(p)),
                    Err(ref e) if *e.kind() == ErrorKind::ZeroSizeRequest => Ok(None),
                    Err(e) => Err(track!(e)),
                };
            }
            Some(ptr) => ptr,
        };
        if size == 0 {
            track!(self.free(ptr))?;
            return Ok(None);
        }

        let current = track!(self.allocated_block_size(ptr, ErrorKind::InvalidFree))?;
        let words = required_words(size);
        if track!(self.resize_in_place(ptr, current, words))? {
            self.metrics.reallocations_in_place.increment();
            debug!(self.logger, "Resized in place";
                   "address" => ptr.as_u32(), "old_words" => current, "new_words" => words);
            track!(self.after_mutation())?;
            return Ok(Some(ptr));
        }

        let new_ptr = track!(self.try_alloc(size))?;
        let mut blocks = Navigator::new(self.arena.as_bytes_mut());
        let old_len = track!(blocks.payload_len(ptr))?;
        let new_len = track!(blocks.payload_len(new_ptr))?;
        track!(blocks.copy_payload(ptr, new_ptr, std::cmp::min(old_len, new_len)))?;
        track!(self.free(ptr))?;

        self.metrics.reallocations_moved.increment();
        debug!(self.logger, "Moved block";
               "from" => ptr.as_u32(), "to" => new_ptr.as_u32(), "new_words" => words);
        Ok(Some(new_ptr))
    }

    /// ヒープ先頭から終端番兵までのブロック群を列挙するイテレータを返す.
    pub fn walk(&self) -> Walk {
        Walk::new(self.arena.as_bytes(), self.base)
    }

    /// ヒープ全体の整合性を検査する.
    ///
    /// 以下の全てが成り立つことを確認する:
    ///
    /// - 開始番兵と終端番兵が正しく配置されている
    /// - 全てのブロックのサイズがダブルワードの倍数で、アドレスがダブルワード境界に沿っている
    /// - 全てのブロックのヘッダとフッタが一致している
    /// - 空きブロック同士が隣接していない
    /// - ブロックを辿っていくと、アリーナの終端にちょうど到達する
    /// - ブロックサイズの合計と`HEAP_OVERHEAD`の和が、アリーナのサイズと一致する
    ///
    /// # Errors
    ///
    /// いずれかが成り立たない場合には、種類が`ErrorKind::InconsistentState`のエラーが返される.
    pub fn check(&self) -> Result<()> {
        let blocks = Navigator::new(self.arena.as_bytes());
        let begin = track!(blocks.prev_tag(self.base))?;
        track_assert!(
            begin == Tag::SENTINEL,
            ErrorKind::InconsistentState,
            "Broken begin sentinel: {:?}",
            begin
        );

        let mut p = self.base;
        let mut prev_free = false;
        let mut total = 0;
        loop {
            track_assert_eq!(p.as_usize() % DWORD_SIZE, 0, ErrorKind::InconsistentState);
            let tag = track!(blocks.tag(p))?;
            if tag.is_sentinel() {
                track_assert!(tag.is_allocated(), ErrorKind::InconsistentState; p);
                break;
            }

            let footer = track!(blocks.footer_tag(p))?;
            track_assert!(
                footer == tag,
                ErrorKind::InconsistentState,
                "Header/footer mismatch: address={}, header={:?}, footer={:?}",
                p,
                tag,
                footer
            );
            track_assert!(
                !(prev_free && !tag.is_allocated()),
                ErrorKind::InconsistentState,
                "Adjacent free blocks: address={}",
                p
            );
            prev_free = !tag.is_allocated();
            total += tag.size_words() as usize * WORD_SIZE;
            p = track!(blocks.next_block(p))?;
        }
        track_assert_eq!(p.as_usize(), blocks.len(), ErrorKind::InconsistentState);
        track_assert_eq!(
            total + HEAP_OVERHEAD,
            self.arena.len(),
            ErrorKind::InconsistentState
        );
        Ok(())
    }

    /// 割当済みブロックのペイロードを返す.
    ///
    /// # Errors
    ///
    /// `ptr`が割当済みブロックを指していない場合には、種類が`ErrorKind::InvalidInput`のエラーが返される.
    pub fn payload(&self, ptr: Address) -> Result<&[u8]> {
        track!(self.allocated_block_size(ptr, ErrorKind::InvalidInput))?;
        let range = track!(Navigator::new(self.arena.as_bytes()).payload_range(ptr))?;
        Ok(&self.arena.as_bytes()[range])
    }

    /// 割当済みブロックのペイロードを、書き込み可能な形で返す.
    ///
    /// # Errors
    ///
    /// `ptr`が割当済みブロックを指していない場合には、種類が`ErrorKind::InvalidInput`のエラーが返される.
    pub fn payload_mut(&mut self, ptr: Address) -> Result<&mut [u8]> {
        track!(self.allocated_block_size(ptr, ErrorKind::InvalidInput))?;
        let range = track!(Navigator::new(self.arena.as_bytes()).payload_range(ptr))?;
        Ok(&mut self.arena.as_bytes_mut()[range])
    }

    /// 割当済みブロックのペイロードのバイト数を返す.
    ///
    /// 値は`alloc`時に要求されたサイズ以上となる.
    ///
    /// # Errors
    ///
    /// `ptr`が割当済みブロックを指していない場合には、種類が`ErrorKind::InvalidInput`のエラーが返される.
    pub fn payload_len(&self, ptr: Address) -> Result<usize> {
        let size = track!(self.allocated_block_size(ptr, ErrorKind::InvalidInput))?;
        Ok(size as usize * WORD_SIZE - WORD_SIZE)
    }

    /// ヒープの先頭ブロックのアドレスを返す.
    pub fn base(&self) -> Address {
        self.base
    }

    /// これまでにアリーナから払い出されたバイト数を返す.
    pub fn granted_bytes(&self) -> u64 {
        self.arena.len() as u64
    }

    /// ヒープ用のメトリクスを返す.
    pub fn metrics(&self) -> &HeapMetrics {
        &self.metrics
    }

    /// アリーナへの参照を返す.
    pub fn arena(&self) -> &A {
        &self.arena
    }

    /// ヒープを破棄して、アリーナを返す.
    pub fn into_arena(self) -> A {
        self.arena
    }

    fn find_fit(&self, words: u32) -> Result<Option<Address>> {
        let blocks = Navigator::new(self.arena.as_bytes());
        let mut p = self.base;
        loop {
            let tag = track!(blocks.tag(p))?;
            if tag.is_sentinel() {
                return Ok(None);
            }
            if !tag.is_allocated() && tag.size_words() >= words {
                return Ok(Some(p));
            }
            p = track!(blocks.next_block(p))?;
        }
    }

    /// アリーナを`words`分拡張し、その領域を空きブロックとして追加する.
    ///
    /// 直前のブロックが空きの場合には、それと結合したブロックが返される.
    fn extend_heap(&mut self, words: u32) -> Result<Address> {
        let bytes = words as usize * WORD_SIZE;

        // 旧終端番兵のヘッダが、新しいブロックのヘッダとなる
        let p = track!(self.grow_arena(bytes))?;
        let mut blocks = Navigator::new(self.arena.as_bytes_mut());
        track!(blocks.set_block(p, words, false))?;
        let end = track!(blocks.next_block(p))?;
        track!(blocks.set_end_sentinel(end))?;
        track!(self.coalesce(p))
    }

    fn grow_arena(&mut self, bytes: usize) -> Result<Address> {
        let len = self.arena.len();
        if bytes > (Address::MAX as usize).saturating_sub(len) {
            self.metrics.exhausted_failures.increment();
            track_panic!(
                ErrorKind::ArenaExhausted,
                "Out of address range: requested={}, len={}",
                bytes,
                len
            );
        }
        let start = match self.arena.grow(bytes) {
            Ok(start) => start,
            Err(e) => {
                if *e.kind() == ErrorKind::ArenaExhausted {
                    self.metrics.exhausted_failures.increment();
                }
                return Err(track!(e));
            }
        };
        track_assert_eq!(start, len, ErrorKind::InconsistentState);

        self.metrics.growths.increment();
        self.metrics.granted_bytes.set(self.arena.len() as f64);
        debug!(self.logger, "Arena grown"; "bytes" => bytes, "granted_bytes" => self.arena.len());
        Ok(Address::from(start as u32))
    }

    /// 空きブロック`p`の先頭`words`分を割当済みにする.
    ///
    /// 残りが`MIN_BLOCK_WORDS`以上であれば、それは新しい空きブロックとして切り出される.
    fn place(&mut self, p: Address, words: u32) -> Result<()> {
        let mut blocks = Navigator::new(self.arena.as_bytes_mut());
        let free = track!(blocks.tag(p))?;
        track_assert!(
            !free.is_allocated() && free.size_words() >= words,
            ErrorKind::InconsistentState; p, free, words
        );

        let remainder = free.size_words() - words;
        let allocated = if remainder >= MIN_BLOCK_WORDS {
            track!(blocks.set_block(p, words, true))?;
            let rest = track!(blocks.next_block(p))?;
            track!(blocks.set_block(rest, remainder, false))?;
            self.metrics.splits.increment();
            words
        } else {
            track!(blocks.set_block(p, free.size_words(), true))?;
            free.size_words()
        };
        self.metrics
            .count_allocation(u64::from(allocated) * WORD_SIZE as u64);
        Ok(())
    }

    /// 空きブロック`p`を、前後の空きブロックと結合する.
    ///
    /// 結果のブロックのアドレスが返される
    /// (直前のブロックと結合した場合には、そのアドレスとなる).
    pub(crate) fn coalesce(&mut self, p: Address) -> Result<Address> {
        let mut blocks = Navigator::new(self.arena.as_bytes_mut());
        let tag = track!(blocks.tag(p))?;
        track_assert!(!tag.is_allocated(), ErrorKind::InconsistentState; p);

        let prev = track!(blocks.prev_tag(p))?;
        let next = track!(blocks.next_block(p))?;
        let next = track!(blocks.tag(next))?;

        let mut start = p;
        let mut size = tag.size_words();
        let mut merged = 0;
        if !prev.is_allocated() {
            start = track!(blocks.prev_block(p))?;
            size += prev.size_words();
            merged += 1;
        }
        if !next.is_allocated() {
            size += next.size_words();
            merged += 1;
        }
        if merged > 0 {
            track!(blocks.set_block(start, size, false))?;
            self.metrics.coalesces.add_u64(merged);
        }
        Ok(start)
    }

    /// 割当済みブロック`ptr`の、その場での伸縮を試みる.
    ///
    /// 伸縮できなかった場合には`false`が返され、ヒープの状態は変化しない.
    fn resize_in_place(&mut self, ptr: Address, current: u32, words: u32) -> Result<bool> {
        let mut blocks = Navigator::new(self.arena.as_bytes_mut());
        if words <= current {
            let remainder = current - words;
            if remainder < MIN_BLOCK_WORDS {
                return Ok(true);
            }
            track!(blocks.set_block(ptr, words, true))?;
            let rest = track!(blocks.next_block(ptr))?;
            track!(blocks.set_block(rest, remainder, false))?;
            self.metrics.splits.increment();
            self.metrics
                .released_bytes
                .add_u64(u64::from(remainder) * WORD_SIZE as u64);
            track!(self.coalesce(rest))?;
            return Ok(true);
        }

        let next = track!(blocks.next_block(ptr))?;
        let next = track!(blocks.tag(next))?;
        if next.is_allocated() || current + next.size_words() < words {
            return Ok(false);
        }

        let total = current + next.size_words();
        let remainder = total - words;
        let grown = if remainder >= MIN_BLOCK_WORDS {
            track!(blocks.set_block(ptr, words, true))?;
            let rest = track!(blocks.next_block(ptr))?;
            track!(blocks.set_block(rest, remainder, false))?;
            self.metrics.splits.increment();
            words - current
        } else {
            track!(blocks.set_block(ptr, total, true))?;
            total - current
        };
        self.metrics
            .allocated_bytes
            .add_u64(u64::from(grown) * WORD_SIZE as u64);
        Ok(true)
    }

    /// `ptr`が割当済みブロックのペイロード先頭を指していることを確認し、そのサイズ(ワード単位)を返す.
    ///
    /// 確認に失敗した場合には、種類が`kind`のエラーが返される.
    fn allocated_block_size(&self, ptr: Address, kind: ErrorKind) -> Result<u32> {
        let blocks = Navigator::new(self.arena.as_bytes());
        let offset = ptr.as_usize();
        track_assert!(
            offset >= self.base.as_usize() && offset < blocks.len(),
            kind,
            "Out of heap: address={}",
            ptr
        );
        track_assert!(offset % DWORD_SIZE == 0, kind; ptr);

        let tag = track!(blocks.tag(ptr))?;
        track_assert!(
            tag.is_allocated() && !tag.is_sentinel(),
            kind,
            "Not an allocated block: address={}, tag={:?}",
            ptr,
            tag
        );
        let footer = blocks.footer_tag(ptr).ok();
        track_assert!(
            footer == Some(tag),
            kind,
            "Header/footer mismatch: address={}, header={:?}, footer={:?}",
            ptr,
            tag,
            footer
        );
        if self.check_consistency {
            let found = self.walk().any(|b| b.address == ptr && b.allocated);
            track_assert!(found, kind, "Unknown block: address={}", ptr);
        }
        Ok(tag.size_words())
    }

    fn after_mutation(&self) -> Result<()> {
        if self.check_consistency {
            if let Err(e) = self.check() {
                crit!(self.logger, "Heap corruption detected: {}", e);
                return Err(track!(e));
            }
        }
        Ok(())
    }
}
