//! The builtin command set, one module per command.

mod cat;
mod cd;
mod clear;
mod echo;
mod exit;
mod fastfetch;
mod grep;
mod help;
mod kill;
mod ls;
mod mkdir;
mod mv;
mod nano;
mod passwd;
mod power;
mod pwd;
mod qimgv;
mod reload;
mod rm;
mod rmdir;
mod touch;
mod wc;

use crate::registry::Builtin;

/// Every stock builtin, in registration order.
pub const ALL: &[Builtin] = &[
    cd::CD,
    pwd::PWD,
    ls::LS,
    cat::CAT,
    touch::TOUCH,
    rm::RM,
    rmdir::RMDIR,
    mkdir::MKDIR,
    mv::MV,
    echo::ECHO,
    grep::GREP,
    wc::WC,
    kill::KILL,
    power::SHUTDOWN,
    power::REBOOT,
    crate::script::RUN,
    reload::RELOAD,
    clear::CLEAR,
    fastfetch::FASTFETCH,
    qimgv::QIMGV,
    nano::NANO,
    passwd::PASSWD,
    exit::EXIT,
    help::HELP,
];
