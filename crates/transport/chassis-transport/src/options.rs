use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::address::Address;
use crate::error::TransportError;

/// 可组合的传输选项函数。
///
/// 选项按注册顺序依次作用于 [`TransportOptions`]，首个返回错误的选项终止整个解析。
pub type TransportOption =
    Arc<dyn Fn(&mut TransportOptions) -> Result<(), TransportError> + Send + Sync>;

/// 介质特有配置的类型键控容器。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 通用层不认识 `TcpOptions` 之类的具体配置，但需要把它们从调用方一路带到工厂；
/// - 以 `TypeId` 为键存放，每种配置类型至多一份，读取方按类型取回。
#[derive(Default)]
pub struct OptionExtensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl OptionExtensions {
    /// 写入一份配置，返回被替换的旧值。
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.map
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any + Send + Sync>(&mut self) -> Option<&mut T> {
        self.map
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for OptionExtensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionExtensions")
            .field("len", &self.map.len())
            .finish()
    }
}

/// 一次连接或监听所使用的完整传输配置。
#[derive(Debug)]
pub struct TransportOptions {
    address: Address,
    extensions: OptionExtensions,
}

impl TransportOptions {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            extensions: OptionExtensions::default(),
        }
    }

    /// 解析地址后按顺序应用选项。
    ///
    /// 地址总是先于其他选项落地，选项函数因此可以读取或改写已解析的地址。
    pub fn parse(url: &str, options: &[TransportOption]) -> Result<Self, TransportError> {
        let mut parsed = Self::new(Address::parse(url)?);
        parsed.apply(options)?;
        Ok(parsed)
    }

    pub fn apply(&mut self, options: &[TransportOption]) -> Result<(), TransportError> {
        options.iter().try_for_each(|option| option(self))
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn address_mut(&mut self) -> &mut Address {
        &mut self.address
    }

    pub fn extensions(&self) -> &OptionExtensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut OptionExtensions {
        &mut self.extensions
    }

    /// 按类型读取介质配置。
    pub fn extension<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }
}

/// 构造一个把 `value` 写入 [`OptionExtensions`] 的选项。
///
/// 选项可能被多次应用（例如监听器重新解析配置），因此要求 `T: Clone`。
pub fn with_extension<T>(value: T) -> TransportOption
where
    T: Any + Clone + Send + Sync,
{
    Arc::new(move |options: &mut TransportOptions| {
        options.extensions_mut().insert(value.clone());
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Marker(u32);

    #[test]
    fn options_apply_in_order() {
        let options: Vec<TransportOption> = vec![with_extension(Marker(1)), with_extension(Marker(2))];
        let parsed = TransportOptions::parse("tcp://127.0.0.1:1", &options).expect("parse");
        assert_eq!(parsed.extension::<Marker>(), Some(&Marker(2)));
        assert_eq!(parsed.extensions().len(), 1);
    }

    #[test]
    fn failing_option_stops_parse() {
        let reject: TransportOption =
            Arc::new(|_: &mut TransportOptions| Err(TransportError::invalid_option("rejected")));
        let options = vec![reject, with_extension(Marker(7))];
        let err = TransportOptions::parse("tcp://127.0.0.1:1", &options).expect_err("rejected");
        assert_eq!(err.code(), "chassis.transport.invalid_option");
    }

    #[test]
    fn option_can_rewrite_address() {
        let force_v4: TransportOption = Arc::new(|options: &mut TransportOptions| {
            options.address_mut().set_scheme("tcp4");
            Ok(())
        });
        let parsed = TransportOptions::parse("127.0.0.1:1", &[force_v4]).expect("parse");
        assert_eq!(parsed.address().scheme(), "tcp4");
    }
}
