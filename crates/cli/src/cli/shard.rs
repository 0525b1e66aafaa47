use vl_domain::config::Config;
use vl_voice::{shard_for, Snowflake};

pub fn run(config: &Config, guild_id: Snowflake, shards: Option<u32>) {
    let count = shards.unwrap_or(config.gateway.shard_count);
    let shard = shard_for(guild_id, count);
    println!("guild {guild_id} -> shard {shard} of {}", count.max(1));
}
