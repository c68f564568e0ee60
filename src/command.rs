use std::fmt;

use crate::value::Arg;

/// 两边的响应值如何比较
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// 完全相等
    Exact,
    /// 两边都是块字符串数组，排序之后再比较，用于KEYS、SMEMBERS这种顺序不确定的命令
    SetEquality,
    /// 只比较结构，不比较具体的值，用于RANDOMKEY、SRANDMEMBER这种随机的命令
    StructuralOnly,
}

/// 一条要同时发给两个server的命令，以及期望的结果
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    name: String,
    args: Vec<Arg>,
    expect_error: bool,
    policy: Policy,
}

impl Command {
    pub fn new(name: impl ToString, args: Vec<Arg>, expect_error: bool, policy: Policy) -> Command {
        Command {
            name: name.to_string(),
            args,
            expect_error,
            policy,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    pub fn expect_error(&self) -> bool {
        self.expect_error
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name.fmt(f)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// 两边都应该执行成功，并且结果完全相同
pub fn succ(name: impl ToString, args: Vec<Arg>) -> Command {
    Command::new(name, args, false, Policy::Exact)
}

/// 两边都应该执行成功，结果作为集合比较
pub fn succ_sorted(name: impl ToString, args: Vec<Arg>) -> Command {
    Command::new(name, args, false, Policy::SetEquality)
}

/// 两边都应该执行成功，只比较结果的结构
pub fn succ_loosely(name: impl ToString, args: Vec<Arg>) -> Command {
    Command::new(name, args, false, Policy::StructuralOnly)
}

/// 两边都应该返回错误
pub fn fail(name: impl ToString, args: Vec<Arg>) -> Command {
    Command::new(name, args, true, Policy::Exact)
}

/// `succ!("SET", "foo", 12)`，参数可以是任意能转换成 [`Arg`] 的类型
#[macro_export]
macro_rules! succ {
    ($name:expr $(, $arg:expr)* $(,)?) => {
        $crate::command::succ($name, vec![$($crate::value::Arg::from($arg)),*])
    };
}

#[macro_export]
macro_rules! succ_sorted {
    ($name:expr $(, $arg:expr)* $(,)?) => {
        $crate::command::succ_sorted($name, vec![$($crate::value::Arg::from($arg)),*])
    };
}

#[macro_export]
macro_rules! succ_loosely {
    ($name:expr $(, $arg:expr)* $(,)?) => {
        $crate::command::succ_loosely($name, vec![$($crate::value::Arg::from($arg)),*])
    };
}

#[macro_export]
macro_rules! fail {
    ($name:expr $(, $arg:expr)* $(,)?) => {
        $crate::command::fail($name, vec![$($crate::value::Arg::from($arg)),*])
    };
}
