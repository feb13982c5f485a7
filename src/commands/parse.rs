//! Textual command grammar.

use crate::core::{ChannelKind, MAX_INTERVAL, normalize_user};

/// A recognised command verb, before its arguments are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// `/status`
    Status,
    /// `/add_user`
    AddUser,
    /// `/remove_user`
    RemoveUser,
    /// `/list_users`
    ListUsers,
    /// `/add_channel`
    AddChannel,
    /// `/remove_channel`
    RemoveChannel,
    /// `/add_service_channel`
    AddServiceChannel,
    /// `/remove_service_channel`
    RemoveServiceChannel,
    /// `/list_channels`
    ListChannels,
    /// `/add_product`
    AddProduct,
    /// `/remove_product`
    RemoveProduct,
    /// `/list_products`
    ListProducts,
    /// `/force_update`
    ForceUpdate,
    /// `/check_now`
    CheckNow,
    /// `/start_updates`
    StartUpdates,
    /// `/stop_updates`
    StopUpdates,
    /// `/set_update_interval`
    SetUpdateInterval,
}

const VERBS: [Verb; 17] = [
    Verb::Status,
    Verb::AddUser,
    Verb::RemoveUser,
    Verb::ListUsers,
    Verb::AddChannel,
    Verb::RemoveChannel,
    Verb::AddServiceChannel,
    Verb::RemoveServiceChannel,
    Verb::ListChannels,
    Verb::AddProduct,
    Verb::RemoveProduct,
    Verb::ListProducts,
    Verb::ForceUpdate,
    Verb::CheckNow,
    Verb::StartUpdates,
    Verb::StopUpdates,
    Verb::SetUpdateInterval,
];

impl Verb {
    /// The slash-prefixed token that selects this verb.
    pub fn token(self) -> &'static str {
        match self {
            Verb::Status => "/status",
            Verb::AddUser => "/add_user",
            Verb::RemoveUser => "/remove_user",
            Verb::ListUsers => "/list_users",
            Verb::AddChannel => "/add_channel",
            Verb::RemoveChannel => "/remove_channel",
            Verb::AddServiceChannel => "/add_service_channel",
            Verb::RemoveServiceChannel => "/remove_service_channel",
            Verb::ListChannels => "/list_channels",
            Verb::AddProduct => "/add_product",
            Verb::RemoveProduct => "/remove_product",
            Verb::ListProducts => "/list_products",
            Verb::ForceUpdate => "/force_update",
            Verb::CheckNow => "/check_now",
            Verb::StartUpdates => "/start_updates",
            Verb::StopUpdates => "/stop_updates",
            Verb::SetUpdateInterval => "/set_update_interval",
        }
    }

    /// One-line description for command menus.
    pub fn description(self) -> &'static str {
        match self {
            Verb::Status => "Get status of the bot",
            Verb::AddUser => "Add user to the whitelist",
            Verb::RemoveUser => "Remove user from whitelist",
            Verb::ListUsers => "List users currently in whitelist",
            Verb::AddChannel => "Add channel to be notified",
            Verb::RemoveChannel => "Stops notifying a channel",
            Verb::AddServiceChannel => "Add channel for service notifications",
            Verb::RemoveServiceChannel => "Stop sending service notifications to a channel",
            Verb::ListChannels => "Lists all currently notified channels",
            Verb::AddProduct => "Adds a new product to be tracked",
            Verb::RemoveProduct => "Stops tracking some product",
            Verb::ListProducts => "List currently tracked products",
            Verb::ForceUpdate => "Notify all channels, regardless of result",
            Verb::CheckNow => "Check for result, as if it was scheduled",
            Verb::StartUpdates => "Turns notifications and updates on",
            Verb::StopUpdates => "Turns notifications and updates off",
            Verb::SetUpdateInterval => "Sets update interval in minutes",
        }
    }

    fn syntax(self) -> &'static str {
        match self {
            Verb::AddUser => "Syntax: /add_user <username>",
            Verb::RemoveUser => "Syntax: /remove_user <username>",
            Verb::AddChannel => "Syntax: /add_channel <channel>",
            Verb::RemoveChannel => "Syntax: /remove_channel <channel>",
            Verb::AddServiceChannel => "Syntax: /add_service_channel <channel>",
            Verb::RemoveServiceChannel => "Syntax: /remove_service_channel <channel>",
            Verb::AddProduct => "Syntax: /add_product <name_of_product> <url>",
            Verb::RemoveProduct => "Syntax: /remove_product <name_of_product>",
            Verb::SetUpdateInterval => "Syntax: /set_update_interval <number of minutes>",
            _ => "",
        }
    }

    /// Find the verb a message starts with.
    ///
    /// The first whitespace-delimited token must be a known command; an
    /// `@botname` suffix on it is ignored. Returns the verb and the rest of
    /// the message.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stockwatch::commands::Verb;
    ///
    /// assert_eq!(
    ///     Verb::split("/add_user@watchbot alice"),
    ///     Some((Verb::AddUser, "alice"))
    /// );
    /// assert_eq!(Verb::split("hello there"), None);
    /// ```
    pub fn split(text: &str) -> Option<(Verb, &str)> {
        let text = text.trim_start();
        let (head, rest) = match text.find(char::is_whitespace) {
            Some(at) => (&text[..at], text[at..].trim()),
            None => (text, ""),
        };
        let token = head.split('@').next().unwrap_or(head);

        VERBS
            .iter()
            .copied()
            .find(|verb| verb.token() == token)
            .map(|verb| (verb, rest))
    }

    /// Check the arguments for this verb.
    ///
    /// # Errors
    ///
    /// Returns the usage text to show the operator when the arguments are
    /// missing or malformed.
    pub fn parse(self, args: &str) -> Result<Command, UsageError> {
        let fields: Vec<&str> = args.split_whitespace().collect();
        let usage = || UsageError(self.syntax());

        let single = || match fields.as_slice() {
            [one] => Ok(one.to_string()),
            _ => Err(usage()),
        };

        let command = match self {
            Verb::Status => Command::Status,
            Verb::ListUsers => Command::ListUsers,
            Verb::ListChannels => Command::ListChannels,
            Verb::ListProducts => Command::ListProducts,
            Verb::ForceUpdate => Command::ForceUpdate,
            Verb::CheckNow => Command::CheckNow,
            Verb::StartUpdates => Command::StartUpdates,
            Verb::StopUpdates => Command::StopUpdates,

            Verb::AddUser => Command::AddUser(normalize_user(&single()?).ok_or_else(usage)?),
            Verb::RemoveUser => Command::RemoveUser(normalize_user(&single()?).ok_or_else(usage)?),

            Verb::AddChannel => Command::AddChannel(ChannelKind::Notify, single()?),
            Verb::RemoveChannel => Command::RemoveChannel(ChannelKind::Notify, single()?),
            Verb::AddServiceChannel => Command::AddChannel(ChannelKind::Service, single()?),
            Verb::RemoveServiceChannel => Command::RemoveChannel(ChannelKind::Service, single()?),

            Verb::AddProduct => match fields.as_slice() {
                [name, url] => Command::AddProduct {
                    name: name.to_string(),
                    url: url.to_string(),
                },
                _ => return Err(usage()),
            },
            Verb::RemoveProduct => Command::RemoveProduct(single()?),

            Verb::SetUpdateInterval => {
                let raw = single()?;
                let max_minutes = MAX_INTERVAL.as_secs() / 60;
                match raw.parse::<u64>() {
                    Ok(minutes) if minutes > 0 && minutes <= max_minutes => {
                        Command::SetUpdateInterval { minutes }
                    }
                    _ => return Err(UsageError(POSITIVE_MINUTES)),
                }
            }
        };

        Ok(command)
    }
}

const POSITIVE_MINUTES: &str = "Expected positive integer as first argument";

/// Malformed command arguments. The message is shown to the operator
/// verbatim and never escalated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct UsageError(pub &'static str);

/// A fully parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Dump configuration, last manifest and check times.
    Status,
    /// Whitelist an operator.
    AddUser(String),
    /// Remove an operator from the whitelist.
    RemoveUser(String),
    /// List whitelisted operators.
    ListUsers,
    /// Add a notify or service channel.
    AddChannel(ChannelKind, String),
    /// Remove a notify or service channel.
    RemoveChannel(ChannelKind, String),
    /// List both channel lists.
    ListChannels,
    /// Track a product, or change its URL.
    AddProduct {
        /// Unique product name
        name: String,
        /// Source URL of the product page
        url: String,
    },
    /// Stop tracking a product.
    RemoveProduct(String),
    /// List tracked products.
    ListProducts,
    /// Run a cycle and notify regardless of changes.
    ForceUpdate,
    /// Run a cycle as if it was scheduled.
    CheckNow,
    /// Turn the scheduler on.
    StartUpdates,
    /// Turn the scheduler off.
    StopUpdates,
    /// Change the polling interval.
    SetUpdateInterval {
        /// New interval in minutes, at least 1
        minutes: u64,
    },
}

impl Command {
    /// Every command token with its description, in menu order.
    pub fn catalogue() -> impl Iterator<Item = (&'static str, &'static str)> {
        VERBS.iter().map(|verb| (verb.token(), verb.description()))
    }
}
