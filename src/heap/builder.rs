use prometrics::metrics::MetricBuilder;
use slog::{Discard, Logger};

use crate::arena::Arena;
use crate::heap::{Heap, DEFAULT_INITIAL_WORDS};
use crate::metrics::HeapMetrics;
use crate::{ErrorKind, Result};

/// `Heap`のビルダ.
#[derive(Debug, Clone)]
pub struct HeapBuilder {
    initial_words: u32,
    check_consistency: bool,
    logger: Logger,
    metrics: MetricBuilder,
}
impl HeapBuilder {
    /// 新しい`HeapBuilder`インスタンスを生成する.
    pub fn new() -> Self {
        HeapBuilder {
            initial_words: DEFAULT_INITIAL_WORDS,
            check_consistency: false,
            logger: Logger::root(Discard, o!()),
            metrics: MetricBuilder::new(),
        }
    }

    /// 初期化時に用意する空きブロックのサイズ(ワード単位)を設定する.
    ///
    /// 値は偶数(i.e., ダブルワードの倍数)である必要がある.
    /// そうではない場合には、ヒープの構築時にエラーが返される.
    ///
    /// `0`が指定された場合には、空きブロックは作られず、番兵のみが配置される.
    ///
    /// デフォルト値は`6`
    /// (番兵分と合わせて、アリーナ全体で4ダブルワード).
    pub fn initial_words(&mut self, words: u32) -> &mut Self {
        self.initial_words = words;
        self
    }

    /// ヒープを変更する全ての操作の後に、ヒープ全体の整合性検査を行うかどうかを設定する.
    ///
    /// 検査にはヒープ内のブロック数に比例した時間が掛かるので、デバッグ用途を想定している.
    ///
    /// デフォルト値は`false`.
    pub fn check_consistency(&mut self, enable: bool) -> &mut Self {
        self.check_consistency = enable;
        self
    }

    /// ヒープ用の logger を登録する.
    pub fn logger(&mut self, logger: Logger) -> &mut Self {
        self.logger = logger;
        self
    }

    /// メトリクス用の共通設定を登録する.
    ///
    /// デフォルト値は`MetricBuilder::new()`.
    pub fn metrics(&mut self, metrics: MetricBuilder) -> &mut Self {
        self.metrics = metrics;
        self
    }

    /// `arena`上にヒープを初期化する.
    ///
    /// # Errors
    ///
    /// 以下の場合には、種類が`ErrorKind::InvalidInput`のエラーが返される:
    ///
    /// - `initial_words`が奇数
    /// - `arena`が既に拡張済み
    ///
    /// 初期領域分の拡張に失敗した場合には、種類が`ErrorKind::ArenaExhausted`のエラーが返される.
    pub fn build<A>(&self, arena: A) -> Result<Heap<A>>
    where
        A: Arena,
    {
        track_assert_eq!(self.initial_words % 2, 0, ErrorKind::InvalidInput);
        track_assert!(
            arena.is_empty(),
            ErrorKind::InvalidInput,
            "arena_len={}",
            arena.len()
        );

        let metrics = HeapMetrics::new(&self.metrics);
        let logger = self.logger.new(o!("component" => "heap"));
        let mut heap = Heap::new_uninit(arena, logger, metrics, self.check_consistency);
        track!(heap.init(self.initial_words))?;
        Ok(heap)
    }
}
impl Default for HeapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use trackable::result::TestResult;

    use super::*;
    use crate::arena::MemoryArena;
    use crate::ErrorKind;

    #[test]
    fn invalid_initial_words() {
        let e = HeapBuilder::new()
            .initial_words(3)
            .build(MemoryArena::unbounded())
            .err()
            .map(|e| *e.kind());
        assert_eq!(e, Some(ErrorKind::InvalidInput));
    }

    #[test]
    fn non_empty_arena() -> TestResult {
        let mut arena = MemoryArena::unbounded();
        track!(arena.grow(16))?;

        let e = HeapBuilder::new().build(arena).err().map(|e| *e.kind());
        assert_eq!(e, Some(ErrorKind::InvalidInput));
        Ok(())
    }

    #[test]
    fn initial_growth_fails() {
        let e = HeapBuilder::new()
            .initial_words(8)
            .build(MemoryArena::new(64))
            .err()
            .map(|e| *e.kind());
        assert_eq!(e, Some(ErrorKind::ArenaExhausted));
    }

    #[test]
    fn empty_initial_heap() -> TestResult {
        let heap = track!(HeapBuilder::new()
            .initial_words(0)
            .build(MemoryArena::unbounded()))?;
        assert_eq!(heap.granted_bytes(), 16);
        assert_eq!(heap.walk().count(), 0);
        track!(heap.check())?;
        Ok(())
    }
}
