//! 适配器配置

/// 初始化配置
#[derive(Clone, Debug)]
pub struct SortModelOptions {
    /// 子模型声明迭代器持久时，是否在缓存条目里保存子迭代器
    pub cache_child_iters: bool,
    /// 构造时立即构建根层级
    pub build_root_eagerly: bool,
}

impl Default for SortModelOptions {
    fn default() -> Self {
        Self {
            cache_child_iters: true,
            build_root_eagerly: false,
        }
    }
}

impl SortModelOptions {
    /// 不缓存子迭代器，每次都从路径重新解析
    pub fn uncached() -> Self {
        Self {
            cache_child_iters: false,
            ..Self::default()
        }
    }
}
